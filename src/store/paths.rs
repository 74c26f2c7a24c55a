use crate::models::user::Role;

pub const USERS: &str = "users";
pub const ORDERS: &str = "orders";
pub const AVAILABLE_DELIVERIES: &str = "availableDeliveries";
pub const ACCEPTED_DELIVERIES: &str = "acceptedDeliveries";
pub const VEHICLES: &str = "vehicles";
pub const NOTIFICATIONS: &str = "notifications";
pub const ACTIVITY_LOGS: &str = "activityLogs";
pub const KYC_PENDING: &str = "kycPending";

pub fn user(uid: &str) -> String {
    format!("{USERS}/{uid}")
}

pub fn orders_of(role: Role, uid: &str) -> String {
    format!("{ORDERS}/{}/{uid}", role.as_str())
}

pub fn orders_by_role(role: Role) -> String {
    format!("{ORDERS}/{}", role.as_str())
}

pub fn order(role: Role, uid: &str, order_id: &str) -> String {
    format!("{ORDERS}/{}/{uid}/{order_id}", role.as_str())
}

pub fn available_delivery(id: &str) -> String {
    format!("{AVAILABLE_DELIVERIES}/{id}")
}

pub fn accepted_delivery(id: &str) -> String {
    format!("{ACCEPTED_DELIVERIES}/{id}")
}

pub fn vehicle(uid: &str) -> String {
    format!("{VEHICLES}/{uid}")
}

pub fn vehicle_location(uid: &str) -> String {
    format!("{VEHICLES}/{uid}/location")
}

pub fn active_deliveries(uid: &str) -> String {
    format!("{VEHICLES}/{uid}/activeDeliveries")
}

pub fn active_delivery(uid: &str, id: &str) -> String {
    format!("{VEHICLES}/{uid}/activeDeliveries/{id}")
}

pub fn completed_deliveries(uid: &str) -> String {
    format!("{VEHICLES}/{uid}/completedDeliveries")
}

pub fn completed_delivery(uid: &str, id: &str) -> String {
    format!("{VEHICLES}/{uid}/completedDeliveries/{id}")
}

pub fn vehicle_stats(uid: &str) -> String {
    format!("{VEHICLES}/{uid}/stats")
}

pub fn notifications(uid: &str) -> String {
    format!("{NOTIFICATIONS}/{uid}")
}

pub fn notification(uid: &str, id: &str) -> String {
    format!("{NOTIFICATIONS}/{uid}/{id}")
}

pub fn activity_logs(uid: &str) -> String {
    format!("{ACTIVITY_LOGS}/{uid}")
}

pub fn activity_log(uid: &str, id: &str) -> String {
    format!("{ACTIVITY_LOGS}/{uid}/{id}")
}

pub fn kyc_pending(uid: &str) -> String {
    format!("{KYC_PENDING}/{uid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_paths_are_keyed_by_role_then_owner() {
        assert_eq!(
            order(Role::Retailer, "u1", "o1"),
            "orders/retailer/u1/o1".to_string()
        );
        assert_eq!(orders_of(Role::VehicleOwner, "v1"), "orders/vehicle_owner/v1");
    }

    #[test]
    fn vehicle_subtrees_hang_off_the_vehicle_node() {
        assert_eq!(active_delivery("v1", "d1"), "vehicles/v1/activeDeliveries/d1");
        assert_eq!(completed_deliveries("v1"), "vehicles/v1/completedDeliveries");
        assert_eq!(vehicle_stats("v1"), "vehicles/v1/stats");
    }
}
