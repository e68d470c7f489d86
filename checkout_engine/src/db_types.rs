use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

pub use checkout_common::MicroUsdc;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created and the deposit has not been seen yet.
    PendingPayment,
    /// The deposit was detected (or assumed), and the payout has not completed yet.
    Paid,
    /// The payout to the merchant's bank account was executed.
    Withdrawn,
    /// The payout was rejected or cancelled by the settlement provider.
    PayoutError,
}

impl OrderStatusType {
    /// `withdrawn` and `payout_error` are final. The lifecycle never moves an order out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Withdrawn | Self::PayoutError)
    }

    /// The legal edges of the order state machine. Self-transitions are allowed so that data (e.g. the fiat estimate)
    /// can be attached to an order without changing its status.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        if *self == next {
            return true;
        }
        matches!((self, next), (PendingPayment, Paid) | (Paid, Withdrawn) | (Paid, PayoutError))
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::PendingPayment => write!(f, "pending_payment"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Withdrawn => write!(f, "withdrawn"),
            OrderStatusType::PayoutError => write!(f, "payout_error"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "withdrawn" => Ok(Self::Withdrawn),
            "payout_error" => Ok(Self::PayoutError),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// Opaque order identifier. Always a UUID v4 in its hyphenated string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s.trim()).map_err(|e| ConversionError(format!("{s} is not a valid order id. {e}")))?;
        Ok(Self(id.to_string()))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price_usdc: MicroUsdc,
    pub quantity: i64,
}

impl OrderItem {
    /// `None` if the line total does not fit in a `MicroUsdc`.
    pub fn line_total(&self) -> Option<MicroUsdc> {
        self.price_usdc.checked_mul(self.quantity)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderConversionError {
    #[error("An order needs at least one item")]
    NoItems,
    #[error("Item {0} has an invalid quantity. Quantities must be positive")]
    InvalidQuantity(String),
    #[error("Item {0} has a negative price")]
    NegativePrice(String),
    #[error("The order total must be positive")]
    ZeroTotal,
    #[error("The order total is too large")]
    AmountOverflow,
}

/// An order as submitted by the storefront. The total is computed once, here, and is never recomputed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub items: Vec<OrderItem>,
    pub amount: MicroUsdc,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(
        customer_name: String,
        customer_email: Option<String>,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderConversionError> {
        if items.is_empty() {
            return Err(OrderConversionError::NoItems);
        }
        if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
            return Err(OrderConversionError::InvalidQuantity(item.product_id.clone()));
        }
        if let Some(item) = items.iter().find(|i| i.price_usdc.value() < 0) {
            return Err(OrderConversionError::NegativePrice(item.product_id.clone()));
        }
        let amount = items
            .iter()
            .try_fold(MicroUsdc::default(), |total, item| item.line_total().and_then(|line| total.checked_add(line)))
            .ok_or(OrderConversionError::AmountOverflow)?;
        if !amount.is_positive() {
            return Err(OrderConversionError::ZeroTotal);
        }
        let customer_email = customer_email.filter(|e| !e.trim().is_empty());
        Ok(Self { id: OrderId::random(), customer_name, customer_email, items, amount, created_at: Utc::now() })
    }
}

//--------------------------------------          Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub items: Json<Vec<OrderItem>>,
    #[serde(rename = "amountUsdc")]
    pub amount: MicroUsdc,
    /// The latest fiat (COP) estimate for the payout. `None` until a quote, or the fallback rate, has been applied.
    #[serde(rename = "amountCop")]
    pub amount_fiat: Option<f64>,
    pub status: OrderStatusType,
    #[serde(rename = "muralPayoutRequestId", skip_serializing_if = "Option::is_none")]
    pub payout_request_id: Option<String>,
    #[serde(rename = "muralPayoutStatus", skip_serializing_if = "Option::is_none")]
    pub payout_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn has_payout(&self) -> bool {
        self.payout_request_id.as_ref().map(|s| !s.is_empty()).unwrap_or(false)
    }
}
