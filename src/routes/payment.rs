use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::payment::ProcessPaymentRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::PaymentResult,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/process", post(process_payment))
}

#[utoipa::path(
    post,
    path = "/api/Payment/process",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Charge result", body = ApiResponse<PaymentResult>),
        (status = 400, description = "Declined, already paid or not payable"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProcessPaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentResult>>> {
    let resp = payment_service::process_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}
