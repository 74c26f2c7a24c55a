use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    #[serde(default)]
    pub category: String,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub user_role: Role,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_vehicle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wholesaler_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Short human readable item list, e.g. `"Rice x2, Dal x1"`.
    pub fn items_summary(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{} x{}", item.name, item.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Order, OrderItem, OrderStatus};
    use crate::models::user::Role;

    fn item(quantity: u32) -> OrderItem {
        OrderItem {
            product_id: "p".to_string(),
            name: "Bulk".to_string(),
            quantity,
            price: 1.0,
            category: String::new(),
        }
    }

    #[test]
    fn item_count_does_not_wrap_on_large_quantities() {
        let now = Utc::now();
        let order = Order {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            user_role: Role::Retailer,
            items: vec![item(4_000_000_000), item(4_000_000_000)],
            total_amount: 0.0,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            assigned_vehicle: None,
            notes: None,
            wholesaler_id: None,
            delivery_id: None,
            cancelled_by: None,
            cancelled_at: None,
        };

        assert_eq!(order.item_count(), 8_000_000_000);
    }
}
