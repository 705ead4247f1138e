//! Read-only access to order history.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use account_settings_core::{OrderId, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderItem};

/// Order history of a customer.
#[async_trait]
pub trait OrderLookup: Send + Sync {
    /// Whether the user has any order in an open status (processing, pending, on-hold).
    async fn has_open_orders(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    /// All orders of the user, newest first, with their items.
    async fn orders_for(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;
}

/// Order lookup over the `shop` schema.
#[derive(Clone)]
pub struct PgOrderLookup {
    pool: PgPool,
}

impl PgOrderLookup {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    number: String,
    status: String,
    total: Decimal,
    currency: String,
    payment_method_title: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    name: String,
    quantity: i32,
    total: Decimal,
}

fn open_status_names() -> Vec<&'static str> {
    OrderStatus::OPEN.iter().map(|s| s.as_str()).collect()
}

#[async_trait]
impl OrderLookup for PgOrderLookup {
    async fn has_open_orders(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let open = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM shop.orders
                WHERE user_id = $1 AND status = ANY($2)
            )
            ",
        )
        .bind(user_id)
        .bind(open_status_names())
        .fetch_one(&self.pool)
        .await?;
        Ok(open)
    }

    async fn orders_for(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, number, status, total, currency, payment_method_title, created_at
            FROM shop.orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, name, quantity, total
            FROM shop.order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for r in item_rows {
            items.entry(r.order_id).or_default().push(OrderItem {
                name: r.name,
                quantity: r.quantity,
                total: r.total,
            });
        }

        rows.into_iter()
            .map(|r| {
                let status: OrderStatus = r.status.parse().map_err(|e| {
                    RepositoryError::DataCorruption(format!("order {}: {e}", r.number))
                })?;
                Ok(Order {
                    id: r.id,
                    user_id: r.user_id,
                    items: items.remove(&r.id).unwrap_or_default(),
                    number: r.number,
                    status,
                    total: r.total,
                    currency: r.currency,
                    payment_method_title: r.payment_method_title,
                    created_at: r.created_at,
                })
            })
            .collect()
    }
}
