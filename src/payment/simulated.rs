use async_trait::async_trait;
use uuid::Uuid;

use super::{ChargeOutcome, ChargeRequest, ChargeStatus, GatewayError, PaymentGateway};

/// Offline gateway for development and tests.
///
/// Tokens starting with `pm_` or `tok_` succeed, except
/// `pm_card_declined` (declined) and `pm_card_authenticationRequired`
/// (needs further action). Anything else is rejected as an unknown method.
#[derive(Debug, Default, Clone)]
pub struct SimulatedGateway;

pub const DECLINED_TOKEN: &str = "pm_card_declined";
pub const ACTION_REQUIRED_TOKEN: &str = "pm_card_authenticationRequired";

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        if request.amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "amount must be greater than zero".into(),
            ));
        }

        let token = request.payment_token.as_str();
        if token == DECLINED_TOKEN {
            return Err(GatewayError::Provider {
                provider: "Simulated",
                message: "Your card was declined.".into(),
            });
        }
        if !(token.starts_with("pm_") || token.starts_with("tok_")) {
            return Err(GatewayError::Provider {
                provider: "Simulated",
                message: format!("No such PaymentMethod: '{token}'"),
            });
        }

        let transaction_id = format!("sim_{}", Uuid::new_v4().simple());
        let status = if token == ACTION_REQUIRED_TOKEN {
            ChargeStatus::RequiresAction("requires_action".into())
        } else {
            ChargeStatus::Succeeded
        };
        Ok(ChargeOutcome {
            transaction_id,
            status,
        })
    }

    async fn refund(&self, transaction_id: &str, amount: i64) -> Result<bool, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "refund amount must be greater than zero".into(),
            ));
        }
        Ok(transaction_id.starts_with("sim_"))
    }
}
