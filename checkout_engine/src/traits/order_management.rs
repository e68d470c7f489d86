use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderId, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine error. {0}")]
    DatabaseError(String),
    #[error("The order with id {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("Cannot move order {id} from {from} to {to}")]
    IllegalStatusTransition { id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Stored data is invalid. {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

/// The order store.
///
/// All updates are single-row and atomic. Status updates are idempotent: writing the same status twice is harmless,
/// and a `None` fiat estimate always means "keep what is stored".
#[async_trait]
pub trait OrderManagement: Clone + Send + Sync + 'static {
    /// Stores a brand-new order with status `pending_payment`.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// All orders, newest first.
    async fn fetch_all_orders(&self) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Orders that still have lifecycle work outstanding (`pending_payment` or `paid`), oldest first.
    async fn fetch_unfinished_orders(&self) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Sets the order status. When `fiat_estimate` is `None`, the stored estimate is left untouched.
    async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatusType,
        fiat_estimate: Option<f64>,
    ) -> Result<Order, PaymentGatewayError>;

    /// Records the provider's payout request id and its latest status.
    async fn update_payout_metadata(
        &self,
        id: &OrderId,
        payout_request_id: &str,
        payout_status: &str,
    ) -> Result<Order, PaymentGatewayError>;

    /// Deletes every order. Only used for the opt-in reset-on-start of demo deployments.
    async fn reset_orders(&self) -> Result<u64, PaymentGatewayError>;
}
