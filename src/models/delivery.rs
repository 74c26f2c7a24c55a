use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::order::OrderStatus;
use crate::models::user::UserProfile;
use crate::models::vehicle::GeoPoint;

/// Canonical delivery status, carried by the pool entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Available,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Available => "available",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Completed => "completed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;

        matches!(
            (*self, next),
            (Available, Accepted)
                | (Accepted, InProgress)
                | (Accepted, Completed)
                | (InProgress, Completed)
                | (Available, Cancelled)
                | (Accepted, Cancelled)
                | (InProgress, Cancelled)
        )
    }

    /// Order status that mirrors this delivery status.
    pub fn order_status(&self) -> OrderStatus {
        match self {
            DeliveryStatus::Available => OrderStatus::Confirmed,
            DeliveryStatus::Accepted | DeliveryStatus::InProgress => OrderStatus::InProgress,
            DeliveryStatus::Completed => OrderStatus::Completed,
            DeliveryStatus::Cancelled => OrderStatus::Cancelled,
        }
    }
}

/// Contact and address snapshot of one party, frozen when the delivery is
/// published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartySnapshot {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl From<&UserProfile> for PartySnapshot {
    fn from(profile: &UserProfile) -> Self {
        Self {
            uid: profile.uid.clone(),
            name: profile.display_name().to_string(),
            phone: profile.phone.clone(),
            address: profile.address.flatten(),
            location: profile.location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableDelivery {
    pub id: String,
    pub order_id: String,
    pub wholesaler: PartySnapshot,
    pub retailer: PartySnapshot,
    pub items_summary: String,
    pub item_count: u64,
    pub order_total: f64,
    pub distance_km: f64,
    pub delivery_fee: f64,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActiveDeliveryStatus {
    InTransit,
    Completed,
    Cancelled,
}

/// Vehicle-side view of a delivery, flattened for the driver's list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDelivery {
    pub id: String,
    pub order_id: String,
    pub retailer: String,
    pub retailer_phone: String,
    pub address: String,
    pub pickup_name: String,
    pub pickup_address: String,
    pub items_summary: String,
    pub distance_km: f64,
    pub delivery_fee: f64,
    pub status: ActiveDeliveryStatus,
    pub accepted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActiveDelivery {
    pub fn from_available(delivery: &AvailableDelivery, accepted_at: DateTime<Utc>) -> Self {
        Self {
            id: delivery.id.clone(),
            order_id: delivery.order_id.clone(),
            retailer: delivery.retailer.name.clone(),
            retailer_phone: delivery.retailer.phone.clone(),
            address: delivery.retailer.address.clone(),
            pickup_name: delivery.wholesaler.name.clone(),
            pickup_address: delivery.wholesaler.address.clone(),
            items_summary: delivery.items_summary.clone(),
            distance_km: delivery.distance_km,
            delivery_fee: delivery.delivery_fee,
            status: ActiveDeliveryStatus::InTransit,
            accepted_at,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
}

impl From<&UserProfile> for VehicleSnapshot {
    fn from(profile: &UserProfile) -> Self {
        Self {
            uid: profile.uid.clone(),
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            vehicle_number: profile.vehicle_number.clone(),
        }
    }
}

/// Admin audit entry written when a vehicle owner accepts a delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedDeliveryRecord {
    pub id: String,
    pub order_id: String,
    pub vehicle: VehicleSnapshot,
    pub wholesaler: PartySnapshot,
    pub retailer: PartySnapshot,
    pub delivery_fee: f64,
    pub status: DeliveryStatus,
    pub accepted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;

    #[test]
    fn only_forward_edges_are_legal() {
        assert!(Available.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Accepted.can_transition_to(Completed));

        assert!(!Accepted.can_transition_to(Accepted));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Available.can_transition_to(Completed));
    }

    #[test]
    fn terminal_states_cannot_be_cancelled() {
        assert!(Available.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }
}
