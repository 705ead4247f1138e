//! Order history as reported by the order system.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use account_settings_core::{OrderId, OrderStatus, UserId};

/// An order placed by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(skip)]
    pub user_id: UserId,
    /// Customer-facing order number.
    pub number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub payment_method_title: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    pub total: Decimal,
}
