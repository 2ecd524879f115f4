#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use storefront_api::{
    config::JwtConfig,
    db::{create_orm_conn, run_migrations},
    entity::{products, users},
    middleware::auth::AuthUser,
    models::{ROLE_ADMIN, ROLE_USER},
    payment::{PaymentGateway, SimulatedGateway},
    state::AppState,
};

pub const TEST_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_SECRET.to_string(),
        issuer: "storefront-api-test".to_string(),
        ttl_hours: 1,
    }
}

/// Fresh in-memory database with the schema applied.
pub async fn setup_state() -> anyhow::Result<AppState> {
    setup_state_with_gateway(Arc::new(SimulatedGateway)).await
}

pub async fn setup_state_with_gateway(
    payments: Arc<dyn PaymentGateway>,
) -> anyhow::Result<AppState> {
    let orm = create_orm_conn("sqlite::memory:").await?;
    run_migrations(&orm).await?;
    Ok(AppState::new(orm, jwt_config(), payments, "usd"))
}

pub async fn create_user(state: &AppState, username: &str, role: &str) -> anyhow::Result<AuthUser> {
    let email = format!("{username}@example.com");
    let user = users::ActiveModel {
        id: NotSet,
        username: Set(username.to_string()),
        email: Set(email.clone()),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        email,
        role: role.to_string(),
    })
}

pub async fn customer(state: &AppState, username: &str) -> anyhow::Result<AuthUser> {
    create_user(state, username, ROLE_USER).await
}

pub async fn admin(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, "admin", ROLE_ADMIN).await
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<products::Model> {
    create_product_in(state, name, price, stock, "General").await
}

pub async fn create_product_in(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
    category: &str,
) -> anyhow::Result<products::Model> {
    let product = products::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        stock: Set(stock),
        category: Set(category.to_string()),
        image_url: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn stock_of(state: &AppState, product_id: i32) -> anyhow::Result<i32> {
    let product = products::Entity::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))?;
    Ok(product.stock)
}
