use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    audit,
    dto::orders::{CheckoutRequest, CreateOrderRequest, OrderLine, OrderList},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service::cart_lines,
    state::AppState,
    status::{OrderStatus, PaymentStatus, UnknownStatus},
};

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = create_order(
        &state.orm,
        user.user_id,
        &payload.shipping_address,
        &payload.items,
    )
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success("Order created", order, Some(Meta::empty())))
}

/// Places an order for the caller's current cart. The cart is left intact
/// until the order is paid.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<Order>> {
    let lines = cart_lines(&state.orm, user.user_id).await?;
    if lines.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    let order = create_order(&state.orm, user.user_id, &payload.shipping_address, &lines).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success("Order created", order, Some(Meta::empty())))
}

/// Creates an order and reserves stock for every line in one transaction.
///
/// Lines are processed in the order given, so repeated lines for the same
/// product see the stock already taken by earlier ones. Any failure drops the
/// transaction, leaving stock and orders exactly as they were.
pub async fn create_order<C>(
    db: &C,
    user_id: i32,
    shipping_address: &str,
    lines: &[OrderLine],
) -> AppResult<Order>
where
    C: TransactionTrait,
{
    let shipping_address = shipping_address.trim();
    validate_order(shipping_address, lines)?;

    let txn = db.begin().await?;

    let mut snapshots = Vec::with_capacity(lines.len());
    let mut total_amount: i64 = 0;

    for line in lines {
        let product = Products::find_by_id(line.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::ProductNotFound(line.product_id))?;

        if product.stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock,
            });
        }

        total_amount = product
            .price
            .checked_mul(i64::from(line.quantity))
            .and_then(|subtotal| total_amount.checked_add(subtotal))
            .ok_or_else(|| AppError::Validation("order total is too large".into()))?;

        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(product.id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock,
            });
        }

        snapshots.push((product.id, product.name, line.quantity, product.price));
    }

    let now = Utc::now();
    let order = OrderActive {
        id: NotSet,
        user_id: Set(user_id),
        status: Set(OrderStatus::Pending),
        shipping_address: Set(shipping_address.to_string()),
        total_amount: Set(total_amount),
        payment_status: Set(PaymentStatus::Unpaid),
        transaction_id: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(snapshots.len());
    for (product_id, product_name, quantity, unit_price) in snapshots {
        let item = OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(product_id),
            product_name: Set(product_name),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
        }
        .insert(&txn)
        .await?;
        items.push(item);
    }

    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        user_id,
        total_amount,
        lines = items.len(),
        "order placed"
    );

    Ok(Order::from_parts(order, items))
}

fn validate_order(shipping_address: &str, lines: &[OrderLine]) -> AppResult<()> {
    if shipping_address.is_empty() {
        return Err(AppError::Validation("shipping address is required".into()));
    }
    if lines.is_empty() {
        return Err(AppError::Validation("order must contain at least one item".into()));
    }
    if let Some(line) = lines.iter().find(|line| line.quantity < 1) {
        return Err(AppError::Validation(format!(
            "quantity for product {} must be at least 1",
            line.product_id
        )));
    }
    Ok(())
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    list_with(state, condition, query).await
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_with(state, Condition::all(), query).await
}

async fn list_with(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder
            .order_by_asc(OrderCol::CreatedAt)
            .order_by_asc(OrderCol::Id),
        SortOrder::Desc => finder
            .order_by_desc(OrderCol::CreatedAt)
            .order_by_desc(OrderCol::Id),
    };

    let total = finder.clone().count(&state.orm).await?;
    let orders = finder.limit(limit).offset(offset).all(&state.orm).await?;

    let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let mut items_by_order = load_items(&state.orm, &ids).await?;

    let items = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            Order::from_parts(order, items)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::paged("Orders", OrderList { items }, meta))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    order_id: i32,
) -> AppResult<ApiResponse<Order>> {
    let order = find_owned_order(&state.orm, order_id, user.user_id).await?;
    let order = with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("Order", order, None))
}

/// Admin status change from a raw status string such as `"Shipped"`.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: i32,
    raw_status: &str,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let target: OrderStatus = raw_status
        .trim()
        .trim_matches('"')
        .parse()
        .map_err(|err: UnknownStatus| AppError::Validation(err.to_string()))?;

    let order = transition_order(state, user, order_id, None, Target::Exact(target)).await?;
    Ok(ApiResponse::success("Order status updated", order, None))
}

/// Moves an order one step along the fulfilment chain.
pub async fn advance_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: i32,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = transition_order(state, user, order_id, None, Target::Next).await?;
    Ok(ApiResponse::success("Order status advanced", order, None))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    order_id: i32,
) -> AppResult<ApiResponse<Order>> {
    let order = transition_order(
        state,
        user,
        order_id,
        Some(user.user_id),
        Target::Exact(OrderStatus::Cancelled),
    )
    .await?;
    Ok(ApiResponse::success("Order cancelled", order, None))
}

pub async fn request_return(
    state: &AppState,
    user: &AuthUser,
    order_id: i32,
) -> AppResult<ApiResponse<Order>> {
    let order = transition_order(
        state,
        user,
        order_id,
        Some(user.user_id),
        Target::Exact(OrderStatus::ReturnRequested),
    )
    .await?;
    Ok(ApiResponse::success("Return requested", order, None))
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Exact(OrderStatus),
    Next,
}

/// Applies a status change with a compare-and-set on the current status.
/// Cancelling also restocks the items and refunds a paid order; a failed
/// refund rolls the whole change back.
async fn transition_order(
    state: &AppState,
    actor: &AuthUser,
    order_id: i32,
    owner: Option<i32>,
    target: Target,
) -> AppResult<Order> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .filter(|o| owner.is_none_or(|owner_id| o.user_id == owner_id))
        .ok_or(AppError::NotFound)?;

    let from = order.status;
    let to = match target {
        Target::Exact(status) => status,
        Target::Next => from.next().ok_or_else(|| AppError::InvalidTransition {
            from,
            to: "(no next status)".to_string(),
        })?,
    };
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidTransition {
            from,
            to: to.to_string(),
        });
    }

    let updated = Orders::update_many()
        .set(OrderActive {
            status: Set(to),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        })
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(from))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Order status was changed by another request".into(),
        ));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Id)
        .all(&txn)
        .await?;

    let mut refunded = false;
    if to == OrderStatus::Cancelled {
        for item in &items {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }

        if order.payment_status == PaymentStatus::Paid {
            Orders::update_many()
                .set(OrderActive {
                    payment_status: Set(PaymentStatus::Refunded),
                    ..Default::default()
                })
                .filter(OrderCol::Id.eq(order.id))
                .exec(&txn)
                .await?;
        }
    }

    let current = Orders::find_by_id(order.id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    // Refund last, after every other write in this transaction.
    if to == OrderStatus::Cancelled && order.payment_status == PaymentStatus::Paid {
        refund_order(state, &order).await?;
        refunded = true;
    }

    if let Err(err) = txn.commit().await {
        if refunded {
            tracing::error!(
                order_id,
                transaction_id = order.transaction_id.as_deref().unwrap_or_default(),
                amount = order.total_amount,
                error = %err,
                "refund issued but cancellation did not commit; needs reconciliation"
            );
        }
        return Err(err.into());
    }
    let order = current;

    tracing::info!(order_id, from = %from, to = %to, refunded, "order status changed");
    audit::record(
        &state.orm,
        Some(actor.user_id),
        "order_status_change",
        "orders",
        serde_json::json!({
            "order_id": order_id,
            "from": from.as_str(),
            "to": to.as_str(),
            "refunded": refunded,
        }),
    )
    .await;

    Ok(Order::from_parts(order, items))
}

async fn refund_order(state: &AppState, order: &OrderModel) -> AppResult<()> {
    let Some(transaction_id) = order.transaction_id.as_deref() else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "paid order {} has no transaction id",
            order.id
        )));
    };

    match state.payments.refund(transaction_id, order.total_amount).await {
        Ok(true) => {
            tracing::info!(
                order_id = order.id,
                transaction_id,
                amount = order.total_amount,
                "refund accepted"
            );
            Ok(())
        }
        Ok(false) => Err(AppError::Gateway("Refund was not completed".into())),
        Err(err) => {
            tracing::warn!(order_id = order.id, error = %err, "refund failed");
            Err(AppError::Gateway(err.to_string()))
        }
    }
}

async fn find_owned_order<C>(conn: &C, order_id: i32, user_id: i32) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    Orders::find_by_id(order_id)
        .filter(OrderCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn with_items<C>(conn: &C, order: OrderModel) -> AppResult<Order>
where
    C: ConnectionTrait,
{
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?;
    Ok(Order::from_parts(order, items))
}

async fn load_items<C>(conn: &C, order_ids: &[i32]) -> AppResult<HashMap<i32, Vec<OrderItemModel>>>
where
    C: ConnectionTrait,
{
    let mut grouped: HashMap<i32, Vec<OrderItemModel>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids.iter().copied()))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?;
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
}
