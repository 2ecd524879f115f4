use sea_orm_migration::MigratorTrait;
use storefront_api::{
    db::{create_orm_conn, run_migrations},
    migration::Migrator,
};

/// `migrate` applies pending migrations, `migrate status` lists them and
/// `migrate fresh` drops every table first.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Only the database is needed here, so the rest of AppConfig is skipped.
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let orm = create_orm_conn(&database_url).await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("up") => {
            run_migrations(&orm).await?;
            tracing::info!("migrations applied");
        }
        Some("status") => Migrator::status(&orm).await?,
        Some("fresh") => {
            Migrator::fresh(&orm).await?;
            tracing::info!("database recreated");
        }
        Some(other) => anyhow::bail!("unknown command '{other}', expected up, status or fresh"),
    }

    Ok(())
}
