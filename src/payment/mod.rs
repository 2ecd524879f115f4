//! Payment gateway abstraction.
//!
//! Order services only talk to [`PaymentGateway`]; the concrete provider is
//! picked from configuration at startup.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{PaymentConfig, PaymentProvider};

mod simulated;
mod stripe;

pub use simulated::{ACTION_REQUIRED_TOKEN, DECLINED_TOKEN, SimulatedGateway};
pub use stripe::StripeGateway;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub payment_token: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    Succeeded,
    /// The provider accepted the request but needs more steps, e.g. 3DS.
    RequiresAction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeOutcome {
    pub transaction_id: String,
    pub status: ChargeStatus,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("Payment failed: {0}")]
    InvalidRequest(String),

    #[error("Payment failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    /// Returns whether the provider accepted the refund.
    async fn refund(&self, transaction_id: &str, amount: i64) -> Result<bool, GatewayError>;
}

pub fn build_gateway(config: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let gateway: Arc<dyn PaymentGateway> = match config.provider {
        PaymentProvider::Simulated => Arc::new(SimulatedGateway::default()),
        PaymentProvider::Stripe => {
            let key = config
                .stripe_secret_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("STRIPE_SECRET_KEY is not set"))?;
            Arc::new(StripeGateway::new(key)?)
        }
    };
    tracing::info!(provider = gateway.name(), "payment gateway configured");
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: PaymentProvider, key: Option<&str>) -> PaymentConfig {
        PaymentConfig {
            provider,
            stripe_secret_key: key.map(str::to_string),
            currency: "usd".into(),
        }
    }

    #[test]
    fn builds_the_configured_provider() {
        let simulated = build_gateway(&config(PaymentProvider::Simulated, None)).unwrap();
        assert_eq!(simulated.name(), "simulated");

        let stripe = build_gateway(&config(PaymentProvider::Stripe, Some("sk_test_123"))).unwrap();
        assert_eq!(stripe.name(), "stripe");
    }

    #[test]
    fn stripe_without_key_is_rejected() {
        assert!(build_gateway(&config(PaymentProvider::Stripe, None)).is_err());
    }

    #[test]
    fn gateway_errors_read_like_provider_messages() {
        let err = GatewayError::Provider {
            provider: "Stripe",
            message: "Your card was declined.".into(),
        };
        assert_eq!(err.to_string(), "Stripe error: Your card was declined.");
        assert_eq!(
            GatewayError::InvalidRequest("bad amount".into()).to_string(),
            "Payment failed: bad amount"
        );
    }
}
