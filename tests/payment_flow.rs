mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storefront_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest, payment::ProcessPaymentRequest},
    error::AppError,
    middleware::auth::AuthUser,
    payment::{
        ACTION_REQUIRED_TOKEN, ChargeOutcome, ChargeRequest, ChargeStatus, DECLINED_TOKEN,
        GatewayError, PaymentGateway,
    },
    services::{cart_service, order_service, payment_service},
    state::AppState,
    status::{OrderStatus, PaymentStatus},
};

fn pay(order_id: i32, token: &str) -> ProcessPaymentRequest {
    ProcessPaymentRequest {
        order_id,
        payment_token: token.to_string(),
    }
}

#[tokio::test]
async fn checkout_then_pay_marks_order_paid_and_clears_cart() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "payer").await?;
    let product = common::create_product(&state, "Kettle", 3499, 4).await?;

    cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;

    let order = order_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            shipping_address: "12 Pay St".into(),
        },
    )
    .await?
    .into_data()
    .expect("order");
    assert_eq!(order.total_amount, 6998);
    assert_eq!(common::stock_of(&state, product.id).await?, 2);

    // Cart survives checkout until payment succeeds.
    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert_eq!(cart.items.len(), 1);

    let result = payment_service::process_payment(&state, &user, pay(order.id, "pm_card_visa"))
        .await?
        .into_data()
        .expect("payment result");
    assert!(result.success);
    let transaction_id = result.transaction_id.expect("transaction id");
    assert!(transaction_id.starts_with("sim_"));

    let paid = order_service::get_order(&state, &user, order.id)
        .await?
        .into_data()
        .expect("order");
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatus::Pending);
    assert_eq!(paid.transaction_id.as_deref(), Some(transaction_id.as_str()));

    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);
    Ok(())
}

#[tokio::test]
async fn declined_payment_leaves_order_unpaid_and_stock_reserved() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "declined").await?;
    let product = common::create_product(&state, "Toaster", 2000, 3).await?;
    let order = order_service::create_order(
        &state.orm,
        user.user_id,
        "13 Decline Ave",
        &[storefront_api::dto::orders::OrderLine {
            product_id: product.id,
            quantity: 1,
        }],
    )
    .await?;

    let err = payment_service::process_payment(&state, &user, pay(order.id, DECLINED_TOKEN))
        .await
        .unwrap_err();
    match err {
        AppError::Gateway(message) => assert!(message.contains("declined")),
        other => panic!("expected Gateway error, got {other:?}"),
    }

    let current = order_service::get_order(&state, &user, order.id)
        .await?
        .into_data()
        .expect("order");
    assert_eq!(current.payment_status, PaymentStatus::Unpaid);
    assert_eq!(current.status, OrderStatus::Pending);
    assert!(current.transaction_id.is_none());
    assert_eq!(common::stock_of(&state, product.id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn paying_twice_is_rejected() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "twice").await?;
    let product = common::create_product(&state, "Blender", 5000, 3).await?;
    let order = order_service::create_order(
        &state.orm,
        user.user_id,
        "14 Repeat Rd",
        &[storefront_api::dto::orders::OrderLine {
            product_id: product.id,
            quantity: 1,
        }],
    )
    .await?;

    payment_service::process_payment(&state, &user, pay(order.id, "pm_card_visa")).await?;
    let err = payment_service::process_payment(&state, &user, pay(order.id, "pm_card_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn cannot_pay_someone_elses_or_cancelled_order() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let owner = common::customer(&state, "owner").await?;
    let thief = common::customer(&state, "thief").await?;
    let product = common::create_product(&state, "Vase", 900, 3).await?;
    let order = order_service::create_order(
        &state.orm,
        owner.user_id,
        "15 Owner Ln",
        &[storefront_api::dto::orders::OrderLine {
            product_id: product.id,
            quantity: 1,
        }],
    )
    .await?;

    let err = payment_service::process_payment(&state, &thief, pay(order.id, "pm_card_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    order_service::cancel_order(&state, &owner, order.id).await?;
    let err = payment_service::process_payment(&state, &owner, pay(order.id, "pm_card_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn action_required_is_reported_without_marking_paid() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "threeds").await?;
    let product = common::create_product(&state, "Camera", 45000, 1).await?;
    let order = order_service::create_order(
        &state.orm,
        user.user_id,
        "16 Secure St",
        &[storefront_api::dto::orders::OrderLine {
            product_id: product.id,
            quantity: 1,
        }],
    )
    .await?;

    let result = payment_service::process_payment(&state, &user, pay(order.id, ACTION_REQUIRED_TOKEN))
        .await?
        .into_data()
        .expect("payment result");
    assert!(!result.success);

    let current = order_service::get_order(&state, &user, order.id)
        .await?
        .into_data()
        .expect("order");
    assert_eq!(current.payment_status, PaymentStatus::Unpaid);
    Ok(())
}

/// Cancels the order while the charge is in flight, then reports success.
struct CancelDuringCharge {
    state: AppState,
    owner: AuthUser,
    order_id: i32,
    refunds: Mutex<Vec<(String, i64)>>,
}

#[async_trait]
impl PaymentGateway for CancelDuringCharge {
    fn name(&self) -> &'static str {
        "cancel-during-charge"
    }

    async fn charge(&self, _request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        order_service::cancel_order(&self.state, &self.owner, self.order_id)
            .await
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        Ok(ChargeOutcome {
            transaction_id: "txn_raced".into(),
            status: ChargeStatus::Succeeded,
        })
    }

    async fn refund(&self, transaction_id: &str, amount: i64) -> Result<bool, GatewayError> {
        self.refunds
            .lock()
            .expect("refund log")
            .push((transaction_id.to_string(), amount));
        Ok(true)
    }
}

#[tokio::test]
async fn order_cancelled_during_charge_is_refunded_not_marked_paid() -> anyhow::Result<()> {
    let base = common::setup_state().await?;
    let user = common::customer(&base, "racer").await?;
    let product = common::create_product(&base, "Lamp", 2500, 4).await?;
    cart_service::add_to_cart(
        &base,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;
    let order = order_service::checkout(
        &base,
        &user,
        CheckoutRequest {
            shipping_address: "17 Race Rd".into(),
        },
    )
    .await?
    .into_data()
    .expect("order");
    assert_eq!(common::stock_of(&base, product.id).await?, 2);

    let gateway = Arc::new(CancelDuringCharge {
        state: base.clone(),
        owner: user.clone(),
        order_id: order.id,
        refunds: Mutex::new(Vec::new()),
    });
    let state = AppState {
        payments: gateway.clone(),
        ..base
    };

    let err = payment_service::process_payment(&state, &user, pay(order.id, "pm_card_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let current = order_service::get_order(&state, &user, order.id)
        .await?
        .into_data()
        .expect("order");
    assert_eq!(current.status, OrderStatus::Cancelled);
    assert_eq!(current.payment_status, PaymentStatus::Unpaid);
    assert!(current.transaction_id.is_none());
    assert_eq!(common::stock_of(&state, product.id).await?, 4);

    let refunds = gateway.refunds.lock().expect("refund log").clone();
    assert_eq!(refunds, vec![("txn_raced".to_string(), 5000)]);

    // The failed payment leaves the cart alone.
    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert_eq!(cart.items.len(), 1);
    Ok(())
}
