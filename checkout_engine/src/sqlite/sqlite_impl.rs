//! `SqliteDatabase` is a concrete implementation of a checkout engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements [`OrderManagement`].
use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, new_pool, orders};
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    traits::{OrderManagement, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `CHECKOUT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), PaymentGatewayError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentGatewayError::DatabaseError(format!("Migrations failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_all_orders(&self) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_all_orders(&mut conn).await?;
        Ok(orders)
    }

    async fn fetch_unfinished_orders(&self) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let statuses = [OrderStatusType::PendingPayment, OrderStatusType::Paid];
        let orders = orders::fetch_orders_with_status(&statuses, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatusType,
        fiat_estimate: Option<f64>,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_order_status(id, status, fiat_estimate, &mut conn).await?;
        debug!("🗃️ Order {id} status set to {status}");
        Ok(order)
    }

    async fn update_payout_metadata(
        &self,
        id: &OrderId,
        payout_request_id: &str,
        payout_status: &str,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_payout_metadata(id, payout_request_id, payout_status, &mut conn).await?;
        debug!("🗃️ Order {id} payout {payout_request_id} is {payout_status}");
        Ok(order)
    }

    async fn reset_orders(&self) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let n = orders::delete_all_orders(&mut conn).await?;
        warn!("🗃️ {n} orders were deleted from the database");
        Ok(n)
    }
}
