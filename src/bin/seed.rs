use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use storefront_api::{
    db::{create_orm_conn, run_migrations},
    entity::{products, users},
    models::{ROLE_ADMIN, ROLE_USER},
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin", "admin@example.com", "admin123", ROLE_ADMIN).await?;
    let user_id = ensure_user(&orm, "user", "user@example.com", "user123", ROLE_USER).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<i32> {
    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(orm)
        .await?;

    let user = match existing {
        Some(user) if user.role == role => user,
        Some(user) => {
            let mut active: users::ActiveModel = user.into();
            active.role = Set(role.to_string());
            active.update(orm).await?
        }
        None => {
            let password_hash =
                hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            users::ActiveModel {
                id: NotSet,
                username: Set(username.to_string()),
                email: Set(email.to_string()),
                password_hash: Set(password_hash),
                role: Set(role.to_string()),
                created_at: Set(Utc::now().into()),
            }
            .insert(orm)
            .await?
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    // name, description, price in cents, stock, category
    let catalog = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 5500, 50, "Apparel"),
        ("Ferris Mug", "Coffee tastes better with Ferris", 1200, 100, "Kitchen"),
        ("Rust Sticker Pack", "Decorate your laptop", 500, 200, "Accessories"),
        ("E-book: Async Rust", "Learn async Rust patterns", 2500, 75, "Books"),
        ("Mechanical Keyboard", "Tactile switches, 75% layout", 12999, 3, "Electronics"),
    ];

    let mut inserted = 0;
    for (name, description, price, stock, category) in catalog {
        let exists = products::Entity::find()
            .filter(products::Column::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        products::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price: Set(price),
            stock: Set(stock),
            category: Set(category.to_string()),
            image_url: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
        inserted += 1;
    }

    println!("Seeded {inserted} products");
    Ok(())
}
