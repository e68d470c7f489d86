use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    if fetch_order(&order.id, conn).await?.is_some() {
        return Err(PaymentGatewayError::OrderAlreadyExists(order.id));
    }
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                customer_name,
                customer_email,
                items,
                amount,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.customer_name)
    .bind(order.customer_email)
    .bind(Json(order.items))
    .bind(order.amount)
    .bind(OrderStatusType::PendingPayment)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted for {}", order.id, order.amount);
    Ok(order)
}

pub async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns every order, most recently created first. Orders created in the same instant are returned in reverse
/// insertion order.
pub async fn fetch_all_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC, rowid DESC").fetch_all(conn).await?;
    trace!("🗃️ Fetched {} orders", orders.len());
    Ok(orders)
}

pub async fn fetch_orders_with_status(
    statuses: &[OrderStatusType],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = sqlx::QueryBuilder::new("SELECT * FROM orders WHERE status IN (");
    let mut list = builder.separated(", ");
    for status in statuses {
        list.push_bind(*status);
    }
    list.push_unseparated(") ORDER BY created_at ASC, rowid ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}

/// Sets the status of an order. The fiat estimate is only overwritten when a new one is given.
pub async fn update_order_status(
    id: &OrderId,
    status: OrderStatusType,
    fiat_estimate: Option<f64>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                amount_fiat = COALESCE($2, amount_fiat),
                updated_at = $3
            WHERE id = $4
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(fiat_estimate)
    .bind(Utc::now())
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(id.clone()))
}

pub async fn update_payout_metadata(
    id: &OrderId,
    payout_request_id: &str,
    payout_status: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    if payout_request_id.trim().is_empty() {
        return Err(PaymentGatewayError::InvalidData(format!("Empty payout request id for order {id}")));
    }
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payout_request_id = $1, payout_status = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(payout_request_id)
    .bind(payout_status)
    .bind(Utc::now())
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(id.clone()))
}

pub async fn delete_all_orders(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders").execute(conn).await?;
    Ok(result.rows_affected())
}
