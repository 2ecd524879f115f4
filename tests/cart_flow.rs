mod common;

use storefront_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    error::AppError,
    services::{cart_service, order_service},
};

fn add(product_id: i32, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity,
    }
}

#[tokio::test]
async fn empty_cart_is_created_on_first_access() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "newbie").await?;

    let first = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    let second = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");

    assert_eq!(first.user_id, user.user_id);
    assert!(first.items.is_empty());
    assert_eq!(first.total_amount, 0);
    assert_eq!(first.id, second.id);
    Ok(())
}

#[tokio::test]
async fn adding_the_same_product_increments_the_line() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "shopper").await?;
    let shirt = common::create_product(&state, "Shirt", 1999, 20).await?;
    let socks = common::create_product(&state, "Socks", 499, 20).await?;

    cart_service::add_to_cart(&state, &user, add(shirt.id, 1)).await?;
    cart_service::add_to_cart(&state, &user, add(socks.id, 3)).await?;
    let cart = cart_service::add_to_cart(&state, &user, add(shirt.id, 2))
        .await?
        .into_data()
        .expect("cart");

    assert_eq!(cart.items.len(), 2);
    let shirt_line = cart
        .items
        .iter()
        .find(|l| l.product_id == shirt.id)
        .expect("shirt line");
    assert_eq!(shirt_line.quantity, 3);
    assert_eq!(shirt_line.subtotal, 5997);
    assert_eq!(shirt_line.product_name, "Shirt");
    assert_eq!(cart.total_amount, 5997 + 1497);
    Ok(())
}

#[tokio::test]
async fn add_rejects_bad_quantity_and_unknown_product() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "picky").await?;
    let product = common::create_product(&state, "Hat", 1200, 5).await?;

    let zero = cart_service::add_to_cart(&state, &user, add(product.id, 0)).await;
    assert!(matches!(zero, Err(AppError::Validation(_))));

    let missing = cart_service::add_to_cart(&state, &user, add(777, 1)).await;
    assert!(matches!(missing, Err(AppError::ProductNotFound(777))));
    Ok(())
}

#[tokio::test]
async fn update_sets_quantity_and_zero_removes() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "updater").await?;
    let product = common::create_product(&state, "Scarf", 1500, 10).await?;
    cart_service::add_to_cart(&state, &user, add(product.id, 1)).await?;

    let cart = cart_service::update_cart_item(&state, &user, product.id, 4)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items[0].quantity, 4);
    assert_eq!(cart.total_amount, 6000);

    let cart = cart_service::update_cart_item(&state, &user, product.id, 0)
        .await?
        .into_data()
        .expect("cart");
    assert!(cart.items.is_empty());

    let missing = cart_service::update_cart_item(&state, &user, product.id, 2).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn remove_and_clear() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "cleaner").await?;
    let a = common::create_product(&state, "A", 100, 10).await?;
    let b = common::create_product(&state, "B", 200, 10).await?;
    cart_service::add_to_cart(&state, &user, add(a.id, 1)).await?;
    cart_service::add_to_cart(&state, &user, add(b.id, 1)).await?;

    let cart = cart_service::remove_from_cart(&state, &user, a.id)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, b.id);

    let again = cart_service::remove_from_cart(&state, &user, a.id).await;
    assert!(matches!(again, Err(AppError::NotFound)));

    let cart = cart_service::clear_cart(&state, &user).await?.into_data().expect("cart");
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn carts_are_per_user() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let alice = common::customer(&state, "alice").await?;
    let bob = common::customer(&state, "bob").await?;
    let product = common::create_product(&state, "Shared", 300, 10).await?;

    cart_service::add_to_cart(&state, &alice, add(product.id, 2)).await?;
    let bobs = cart_service::get_cart(&state, &bob).await?.into_data().expect("cart");
    assert!(bobs.items.is_empty());

    let lines = cart_service::cart_lines(&state.orm, alice.user_id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    Ok(())
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "empty").await?;

    let err = order_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            shipping_address: "1 Nowhere".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn checkout_over_stock_keeps_the_cart() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "greedy").await?;
    let product = common::create_product(&state, "Limited", 1000, 2).await?;
    cart_service::add_to_cart(&state, &user, add(product.id, 5)).await?;

    let err = order_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            shipping_address: "2 Somewhere".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(common::stock_of(&state, product.id).await?, 2);

    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert_eq!(cart.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cart_total_overflow_is_rejected_and_rolled_back() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "whale").await?;
    let yacht = common::create_product(&state, "Yacht", i64::MAX / 2, 10).await?;
    let jet = common::create_product(&state, "Jet", i64::MAX / 2 + 2, 10).await?;

    let err = cart_service::add_to_cart(&state, &user, add(yacht.id, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert!(cart.items.is_empty());

    cart_service::add_to_cart(&state, &user, add(yacht.id, 1)).await?;
    let err = cart_service::update_cart_item(&state, &user, yacht.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Each line fits on its own, the sum does not.
    let err = cart_service::add_to_cart(&state, &user, add(jet.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 1);
    assert_eq!(cart.total_amount, i64::MAX / 2);
    Ok(())
}
