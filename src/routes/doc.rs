use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{Identity, LoginRequest, LoginResponse, RegisterRequest},
        cart::AddToCartRequest,
        orders::{CheckoutRequest, CreateOrderRequest, OrderLine, OrderList},
        payment::ProcessPaymentRequest,
        products::{
            CategoryList, CreateProductRequest, DeletedProduct, ProductList, SetStockRequest,
            UpdateProductRequest,
        },
    },
    models::{Cart, CartLine, Order, OrderItem, PaymentResult, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, payment, products},
    status::{OrderStatus, PaymentStatus},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::list_categories,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::set_stock,
        products::list_low_stock,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::create_order,
        orders::checkout,
        orders::list_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::update_order_status,
        orders::advance_order_status,
        orders::cancel_order,
        orders::request_return,
        payment::process_payment
    ),
    components(
        schemas(
            User,
            Product,
            Cart,
            CartLine,
            Order,
            OrderItem,
            OrderLine,
            OrderStatus,
            PaymentStatus,
            PaymentResult,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            Identity,
            CreateProductRequest,
            UpdateProductRequest,
            SetStockRequest,
            DeletedProduct,
            ProductList,
            CategoryList,
            AddToCartRequest,
            CreateOrderRequest,
            CheckoutRequest,
            OrderList,
            ProcessPaymentRequest,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentResult>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and token identity"),
        (name = "Products", description = "Catalog and inventory endpoints"),
        (name = "Cart", description = "Shopping cart endpoints"),
        (name = "Orders", description = "Order placement and status endpoints"),
        (name = "Payment", description = "Order payment endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
