use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};

use crate::{
    dto::{cart::AddToCartRequest, orders::OrderLine},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartLine},
    response::ApiResponse,
    services::product_service::find_product,
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = load_cart(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("Cart", cart, None))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }
    find_product(&state.orm, payload.product_id).await?;
    let cart = ensure_cart(&state.orm, user.user_id).await?;

    let txn = state.orm.begin().await?;
    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(payload.product_id))
        .one(&txn)
        .await?;

    match existing {
        Some(item) => {
            let quantity = item
                .quantity
                .checked_add(payload.quantity)
                .ok_or_else(|| AppError::Validation("quantity is too large".into()))?;
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
        }
        None => {
            CartItemActive {
                id: NotSet,
                cart_id: Set(cart.id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
            }
            .insert(&txn)
            .await?;
        }
    }

    // Rolls back if the new line pushes the cart total out of range.
    let cart = load_cart(&txn, user.user_id).await?;
    txn.commit().await?;

    tracing::debug!(
        user_id = user.user_id,
        product_id = payload.product_id,
        quantity = payload.quantity,
        "cart line added"
    );

    Ok(ApiResponse::success("Added to cart", cart, None))
}

/// A quantity of zero or less removes the line.
pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
    quantity: i32,
) -> AppResult<ApiResponse<Cart>> {
    let cart = ensure_cart(&state.orm, user.user_id).await?;

    let txn = state.orm.begin().await?;
    let item = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if quantity <= 0 {
        CartItems::delete_by_id(item.id).exec(&txn).await?;
    } else {
        let mut active: CartItemActive = item.into();
        active.quantity = Set(quantity);
        active.update(&txn).await?;
    }

    let cart = load_cart(&txn, user.user_id).await?;
    txn.commit().await?;
    Ok(ApiResponse::success("Cart updated", cart, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
) -> AppResult<ApiResponse<Cart>> {
    let cart = ensure_cart(&state.orm, user.user_id).await?;
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let cart = load_cart(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("Removed from cart", cart, None))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    clear_cart_for(&state.orm, user.user_id).await?;
    let cart = load_cart(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("Cart cleared", cart, None))
}

/// Current cart contents as order lines, oldest first.
pub async fn cart_lines<C>(conn: &C, user_id: i32) -> AppResult<Vec<OrderLine>>
where
    C: ConnectionTrait,
{
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(Vec::new());
    };

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|item| OrderLine {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();
    Ok(lines)
}

pub async fn clear_cart_for<C>(conn: &C, user_id: i32) -> AppResult<u64>
where
    C: ConnectionTrait,
{
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(0);
    };
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn find_cart<C>(conn: &C, user_id: i32) -> AppResult<Option<CartModel>>
where
    C: ConnectionTrait,
{
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn ensure_cart<C>(conn: &C, user_id: i32) -> AppResult<CartModel>
where
    C: ConnectionTrait,
{
    if let Some(cart) = find_cart(conn, user_id).await? {
        return Ok(cart);
    }

    let inserted = CartActive {
        id: NotSet,
        user_id: Set(user_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(cart) => Ok(cart),
        // Another request created it first.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_cart(conn, user_id).await?.ok_or(AppError::NotFound)
        }
        Err(err) => Err(err.into()),
    }
}

async fn load_cart<C>(conn: &C, user_id: i32) -> AppResult<Cart>
where
    C: ConnectionTrait,
{
    let cart = ensure_cart(conn, user_id).await?;
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut total_amount: i64 = 0;
    for (item, product) in rows {
        let Some(product) = product else { continue };
        let line = CartLine::new(item, &product).ok_or_else(total_too_large)?;
        total_amount = total_amount
            .checked_add(line.subtotal)
            .ok_or_else(total_too_large)?;
        items.push(line);
    }

    Ok(Cart {
        id: cart.id,
        user_id: cart.user_id,
        items,
        total_amount,
    })
}

fn total_too_large() -> AppError {
    AppError::Validation("cart total is too large".into())
}
