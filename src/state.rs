use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::JwtConfig, payment::PaymentGateway};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub jwt: Arc<JwtConfig>,
    pub payments: Arc<dyn PaymentGateway>,
    pub currency: String,
}

impl AppState {
    pub fn new(
        orm: DatabaseConnection,
        jwt: JwtConfig,
        payments: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            orm,
            jwt: Arc::new(jwt),
            payments,
            currency: currency.into(),
        }
    }
}
