mod common;

use storefront_api::{
    dto::{
        orders::OrderLine,
        products::{CreateProductRequest, SetStockRequest, UpdateProductRequest},
    },
    error::AppError,
    routes::params::{LowStockQuery, ProductQuery, ProductSortBy, SortOrder},
    services::{cart_service, order_service, product_service},
};

fn new_product(name: &str, price: i64, stock: i32) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        description: None,
        price,
        stock,
        category: "Tools".to_string(),
        image_url: None,
    }
}

#[tokio::test]
async fn admin_manages_products() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::admin(&state).await?;

    let created = product_service::create_product(&state, &admin, new_product("Hammer", 1599, 12))
        .await?
        .into_data()
        .expect("product");
    assert_eq!(created.price, 1599);
    assert_eq!(created.category, "Tools");

    let updated = product_service::update_product(
        &state,
        &admin,
        created.id,
        UpdateProductRequest {
            price: Some(1799),
            description: Some("Claw hammer".into()),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .expect("product");
    assert_eq!(updated.price, 1799);
    assert_eq!(updated.name, "Hammer");
    assert_eq!(updated.description.as_deref(), Some("Claw hammer"));

    let stocked = product_service::set_stock(&state, &admin, created.id, SetStockRequest { stock: 0 })
        .await?
        .into_data()
        .expect("product");
    assert_eq!(stocked.stock, 0);

    product_service::delete_product(&state, &admin, created.id).await?;
    let gone = product_service::get_product(&state, created.id).await;
    assert!(matches!(gone, Err(AppError::ProductNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn product_mutations_require_admin_and_valid_input() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::customer(&state, "meddler").await?;
    let admin = common::admin(&state).await?;
    let product = common::create_product(&state, "Saw", 2500, 3).await?;

    let forbidden = product_service::create_product(&state, &user, new_product("Drill", 100, 1)).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let forbidden = product_service::set_stock(&state, &user, product.id, SetStockRequest { stock: 9 }).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let negative = product_service::set_stock(&state, &admin, product.id, SetStockRequest { stock: -1 }).await;
    assert!(matches!(negative, Err(AppError::Validation(_))));

    let blank = product_service::create_product(&state, &admin, new_product("  ", 100, 1)).await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let cheap = product_service::create_product(&state, &admin, new_product("Free", -5, 1)).await;
    assert!(matches!(cheap, Err(AppError::Validation(_))));

    let missing = product_service::set_stock(&state, &admin, 5555, SetStockRequest { stock: 1 }).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    assert_eq!(common::stock_of(&state, product.id).await?, 3);
    Ok(())
}

#[tokio::test]
async fn ordered_products_cannot_be_deleted() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::admin(&state).await?;
    let user = common::customer(&state, "buyer").await?;
    let sold = common::create_product(&state, "Sold", 100, 5).await?;
    let carted = common::create_product(&state, "Carted", 100, 5).await?;

    order_service::create_order(
        &state.orm,
        user.user_id,
        "1 Keep St",
        &[OrderLine {
            product_id: sold.id,
            quantity: 1,
        }],
    )
    .await?;
    cart_service::add_to_cart(
        &state,
        &user,
        storefront_api::dto::cart::AddToCartRequest {
            product_id: carted.id,
            quantity: 1,
        },
    )
    .await?;

    let err = product_service::delete_product(&state, &admin, sold.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    product_service::delete_product(&state, &admin, carted.id).await?;
    let cart = cart_service::get_cart(&state, &user).await?.into_data().expect("cart");
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn listing_filters_sorts_and_pages() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    common::create_product_in(&state, "Red Apple", 300, 10, "Fruit").await?;
    common::create_product_in(&state, "Green Apple", 250, 10, "Fruit").await?;
    common::create_product_in(&state, "Banana", 120, 10, "Fruit").await?;
    common::create_product_in(&state, "Apple Juice", 450, 10, "Drinks").await?;

    let apples = product_service::list_products(
        &state,
        ProductQuery {
            q: Some("Apple".into()),
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?;
    let meta = apples.meta.clone().expect("meta");
    let names: Vec<String> = apples
        .into_data()
        .expect("products")
        .items
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Green Apple", "Red Apple", "Apple Juice"]);
    assert_eq!(meta.total, Some(3));

    let fruit_under_3 = product_service::list_products(
        &state,
        ProductQuery {
            category: Some("Fruit".into()),
            max_price: Some(299),
            sort_by: Some(ProductSortBy::Name),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .expect("products");
    let names: Vec<&str> = fruit_under_3.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Banana", "Green Apple"]);

    let page_two = product_service::list_products(
        &state,
        ProductQuery {
            page: Some(2),
            per_page: Some(3),
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        },
    )
    .await?;
    let meta = page_two.meta.clone().expect("meta");
    assert_eq!(meta.total, Some(4));
    assert_eq!(meta.total_pages, Some(2));
    let items = page_two.into_data().expect("products").items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Banana");

    let categories = product_service::list_categories(&state)
        .await?
        .into_data()
        .expect("categories");
    assert_eq!(categories.items, vec!["Drinks", "Fruit"]);
    Ok(())
}

#[tokio::test]
async fn low_stock_report_uses_threshold() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::admin(&state).await?;
    let user = common::customer(&state, "curious").await?;
    common::create_product(&state, "Plenty", 100, 50).await?;
    let low = common::create_product(&state, "Low", 100, 4).await?;
    let out = common::create_product(&state, "Out", 100, 0).await?;

    let report = product_service::list_low_stock(&state, &admin, LowStockQuery::default())
        .await?
        .into_data()
        .expect("products");
    let ids: Vec<i32> = report.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![out.id, low.id]);

    let wider = product_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            threshold: Some(100),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .expect("products");
    assert_eq!(wider.items.len(), 3);

    let forbidden = product_service::list_low_stock(&state, &user, LowStockQuery::default()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));
    Ok(())
}
