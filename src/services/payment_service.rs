use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};

use crate::{
    audit,
    dto::payment::ProcessPaymentRequest,
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::PaymentResult,
    payment::{ChargeRequest, ChargeStatus},
    response::ApiResponse,
    services::cart_service::clear_cart_for,
    state::AppState,
    status::{OrderStatus, PaymentStatus},
};

/// Charges the order total through the configured gateway.
///
/// Stock was already reserved when the order was placed. A failed charge
/// leaves the order `Unpaid` and keeps the reservation until the owner cancels.
pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ProcessPaymentRequest,
) -> AppResult<ApiResponse<PaymentResult>> {
    let token = payload.payment_token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("paymentToken is required".into()));
    }

    let order = Orders::find_by_id(payload.order_id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status != PaymentStatus::Unpaid {
        return Err(AppError::BadRequest("Order already paid".into()));
    }
    if !order.status.can_be_paid() {
        return Err(AppError::BadRequest(format!(
            "Order in status {} cannot be paid",
            order.status
        )));
    }

    let request = ChargeRequest {
        amount: order.total_amount,
        currency: state.currency.clone(),
        payment_token: token.to_string(),
        description: format!("Order #{}", order.id),
    };

    let outcome = match state.payments.charge(request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(
                order_id = order.id,
                provider = state.payments.name(),
                error = %err,
                "payment failed"
            );
            return Err(AppError::Gateway(err.to_string()));
        }
    };

    if let ChargeStatus::RequiresAction(status) = &outcome.status {
        tracing::info!(order_id = order.id, status = %status, "payment requires action");
        return Ok(ApiResponse::success(
            "Payment pending",
            PaymentResult {
                success: false,
                transaction_id: Some(outcome.transaction_id),
                message: format!("Payment requires additional action ({status})"),
            },
            None,
        ));
    }

    let txn = state.orm.begin().await?;
    let updated = Orders::update_many()
        .set(OrderActive {
            payment_status: Set(PaymentStatus::Paid),
            transaction_id: Set(Some(outcome.transaction_id.clone())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        })
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::PaymentStatus.eq(PaymentStatus::Unpaid))
        .filter(OrderCol::Status.is_not_in([OrderStatus::Cancelled, OrderStatus::ReturnRequested]))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        txn.rollback().await?;
        refund_orphaned_charge(state, order.id, &outcome.transaction_id, order.total_amount).await;
        return Err(AppError::Conflict(
            "Order was paid or cancelled while the payment was processing".into(),
        ));
    }
    clear_cart_for(&txn, user.user_id).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        transaction_id = %outcome.transaction_id,
        amount = order.total_amount,
        "payment captured"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_payment",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "transaction_id": outcome.transaction_id,
            "amount": order.total_amount,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment successful",
        PaymentResult {
            success: true,
            transaction_id: Some(outcome.transaction_id),
            message: "Payment successful".to_string(),
        },
        None,
    ))
}

/// Gives back a charge whose order was paid or closed by another request
/// while the gateway call was in flight.
async fn refund_orphaned_charge(state: &AppState, order_id: i32, transaction_id: &str, amount: i64) {
    match state.payments.refund(transaction_id, amount).await {
        Ok(true) => tracing::warn!(
            order_id,
            transaction_id,
            amount,
            "order changed during payment; charge refunded"
        ),
        Ok(false) => tracing::error!(
            order_id,
            transaction_id,
            amount,
            "order changed during payment; refund rejected, charge needs manual review"
        ),
        Err(err) => tracing::error!(
            order_id,
            transaction_id,
            amount,
            error = %err,
            "order changed during payment; refund failed, charge needs manual review"
        ),
    }
}
