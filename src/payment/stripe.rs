use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ChargeOutcome, ChargeRequest, ChargeStatus, GatewayError, PaymentGateway};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe PaymentIntents over the REST API.
pub struct StripeGateway {
    client: Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Refund {
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    pub fn with_base_url(secret_key: String, base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = match response.json::<StripeErrorBody>().await {
            Ok(body) => body.error.message.unwrap_or_else(|| status.to_string()),
            Err(_) => status.to_string(),
        };
        tracing::warn!(status = %status, path, "stripe request rejected");
        Err(provider_error(status, message))
    }
}

fn provider_error(status: StatusCode, message: String) -> GatewayError {
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };
    GatewayError::Provider {
        provider: "Stripe",
        message,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        if request.amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "amount must be greater than zero".into(),
            ));
        }
        let form = [
            ("amount", request.amount.to_string()),
            ("currency", request.currency),
            ("payment_method", request.payment_token),
            ("description", request.description),
            ("confirmation_method", "manual".to_string()),
            ("confirm", "true".to_string()),
        ];
        let intent: PaymentIntent = self.post_form("/payment_intents", &form).await?;

        let status = if intent.status == "succeeded" {
            ChargeStatus::Succeeded
        } else {
            ChargeStatus::RequiresAction(intent.status)
        };
        Ok(ChargeOutcome {
            transaction_id: intent.id,
            status,
        })
    }

    async fn refund(&self, transaction_id: &str, amount: i64) -> Result<bool, GatewayError> {
        let form = [
            ("payment_intent", transaction_id.to_string()),
            ("amount", amount.to_string()),
        ];
        let refund: Refund = self.post_form("/refunds", &form).await?;
        // Card refunds usually settle asynchronously.
        Ok(matches!(refund.status.as_str(), "succeeded" | "pending"))
    }
}
