//! Order and payment status values plus the order transition table.

use std::{fmt, str::FromStr};

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of an order.
///
/// The forward chain is `Pending -> Processing -> Shipped -> Delivered`.
/// `Cancelled` branches off `Pending`/`Processing`, `Return Requested`
/// branches off `Delivered`. Stored as the display string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Processing")]
    Processing,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
    #[sea_orm(string_value = "Return Requested")]
    #[serde(rename = "Return Requested")]
    ReturnRequested,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::ReturnRequested => "Return Requested",
        }
    }

    /// Next status on the forward fulfilment chain, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::ReturnRequested => None,
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if self.next() == Some(target) {
            return true;
        }
        matches!(
            (self, target),
            (OrderStatus::Pending | OrderStatus::Processing, OrderStatus::Cancelled)
                | (OrderStatus::Delivered, OrderStatus::ReturnRequested)
        )
    }

    /// No further fulfilment step. `Delivered` still allows a return request.
    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }

    /// Cancelled and returned orders are closed to payment. Fulfilment may
    /// run ahead of payment, so every other status can still be paid.
    pub fn can_be_paid(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::ReturnRequested)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status '{}'", self.0)
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    /// Accepts the display form case-insensitively, plus `return_requested`
    /// and `ReturnRequested` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "returnrequested" => Ok(OrderStatus::ReturnRequested),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "Unpaid")]
    Unpaid,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Refunded")]
    Refunded,
}
