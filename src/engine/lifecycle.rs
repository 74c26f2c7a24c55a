//! Delivery lifecycle coordinator.
//!
//! An order moves `pending → confirmed` when a wholesaler packs it, which
//! publishes an [`AvailableDelivery`] into the shared pool. From there the
//! pool entry carries the canonical [`DeliveryStatus`]:
//!
//! ```text
//! available → accepted → in_progress → completed
//!      └──────────┴────────────┴──────→ cancelled (admin)
//! ```
//!
//! Every transition reads what it needs and writes all of its projections
//! (pool entry, vehicle lists, admin audit record, order, notifications,
//! activity log) inside one store transaction, so either all of them change
//! or none do.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::notify::{stage_activity, stage_notification};
use crate::engine::users::load_profile;
use crate::error::AppError;
use crate::geo::route_distance_km;
use crate::models::delivery::{
    AcceptedDeliveryRecord, ActiveDelivery, ActiveDeliveryStatus, AvailableDelivery,
    DeliveryStatus, PartySnapshot, VehicleSnapshot,
};
use crate::models::notification::NotificationKind;
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::user::Role;
use crate::models::vehicle::{VehicleLocation, VehicleStats};
use crate::session::Session;
use crate::state::AppState;
use crate::store::{Txn, paths};

pub const MAX_ITEM_QUANTITY: u32 = 100_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlaceOrder {
    fn validate(&self) -> Result<(), AppError> {
        if self.items.is_empty() {
            return Err(AppError::BadRequest("an order needs at least one item".to_string()));
        }

        for item in &self.items {
            if item.product_id.trim().is_empty() || item.name.trim().is_empty() {
                return Err(AppError::BadRequest(
                    "every item needs a product id and a name".to_string(),
                ));
            }
            if item.quantity == 0 || item.quantity > MAX_ITEM_QUANTITY {
                return Err(AppError::BadRequest(format!(
                    "quantity of {} must be between 1 and {MAX_ITEM_QUANTITY}",
                    item.name
                )));
            }
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(AppError::BadRequest(format!(
                    "price of {} must be a non-negative amount",
                    item.name
                )));
            }
        }

        Ok(())
    }
}

pub fn place_order(
    state: &AppState,
    session: &Session,
    request: PlaceOrder,
) -> Result<Order, AppError> {
    session.require(&[Role::Retailer])?;
    session.require_verified()?;
    request.validate()?;

    let started = Instant::now();
    let now = state.clock.now();
    let total = request.items.iter().map(OrderItem::line_total).sum::<f64>();

    let order = Order {
        id: Uuid::new_v4().to_string(),
        user_id: session.uid.clone(),
        user_role: session.role,
        items: request.items,
        total_amount: (total * 100.0).round() / 100.0,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
        assigned_vehicle: None,
        notes: request.notes.filter(|notes| !notes.trim().is_empty()),
        wholesaler_id: None,
        delivery_id: None,
        cancelled_by: None,
        cancelled_at: None,
    };

    let result = state.store.transaction(|txn| {
        txn.set(paths::order(session.role, &session.uid, &order.id), &order)?;
        stage_notification(
            txn,
            now,
            &session.uid,
            NotificationKind::Order,
            format!("Order placed: {} (₹{:.2})", order.items_summary(), order.total_amount),
            Some(&order.id),
        )?;
        stage_activity(txn, now, &session.uid, "place_order", format!("order {}", order.id))
    });
    observe(state, "place_order", started, &result);
    result?;

    info!(
        order_id = %order.id,
        retailer = %session.uid,
        total = order.total_amount,
        "order placed"
    );
    Ok(order)
}

/// Own orders for retailers, newest first.
pub fn list_own_orders(state: &AppState, session: &Session) -> Result<Vec<Order>, AppError> {
    let mut orders: Vec<Order> = state
        .store
        .children_as::<Order>(&paths::orders_of(session.role, &session.uid))?
        .into_iter()
        .map(|(_, order)| order)
        .collect();

    orders.sort_by_key(|order| Reverse(order.created_at));
    Ok(orders)
}

/// Orders waiting for a wholesaler, oldest first.
pub fn list_pending_orders(state: &AppState, session: &Session) -> Result<Vec<Order>, AppError> {
    session.require(&[Role::Wholesaler, Role::Admin])?;

    let mut orders: Vec<Order> = all_orders(state)?
        .into_iter()
        .filter(|order| order.status == OrderStatus::Pending)
        .collect();

    orders.sort_by_key(|order| order.created_at);
    Ok(orders)
}

pub fn list_all_orders(state: &AppState, admin: &Session) -> Result<Vec<Order>, AppError> {
    admin.require(&[Role::Admin])?;

    let mut orders = all_orders(state)?;
    orders.sort_by_key(|order| Reverse(order.created_at));
    Ok(orders)
}

fn all_orders(state: &AppState) -> Result<Vec<Order>, AppError> {
    type ByOwner = BTreeMap<String, BTreeMap<String, Order>>;

    Ok(state
        .store
        .children_as::<ByOwner>(paths::ORDERS)?
        .into_iter()
        .flat_map(|(_, owners)| owners.into_values())
        .flat_map(|orders| orders.into_values())
        .collect())
}

/// Wholesaler marks a retailer's order packed, publishing it to the pool.
pub fn pack_order(
    state: &AppState,
    session: &Session,
    retailer_uid: &str,
    order_id: &str,
) -> Result<AvailableDelivery, AppError> {
    session.require(&[Role::Wholesaler])?;
    session.require_verified()?;

    let started = Instant::now();
    let now = state.clock.now();

    let result = state.store.transaction(|txn| {
        let order_path = paths::order(Role::Retailer, retailer_uid, order_id);
        let mut order: Order = txn
            .get_as(&order_path)?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "order {order_id} is already {}",
                order.status.as_str()
            )));
        }

        // An order carries at most one live delivery.
        if let Some(previous) = order.delivery_id.as_deref() {
            let live = txn
                .get_as::<AvailableDelivery>(&paths::available_delivery(previous))?
                .is_some_and(|delivery| !delivery.status.is_terminal());
            if live {
                return Err(AppError::Conflict(format!(
                    "order {order_id} already has delivery {previous} in flight"
                )));
            }
        }

        let wholesaler = load_profile(txn, &session.uid)?;
        let retailer = load_profile(txn, retailer_uid)?;

        let distance_km =
            route_distance_km(wholesaler.location.as_ref(), retailer.location.as_ref());
        let delivery = AvailableDelivery {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            wholesaler: PartySnapshot::from(&wholesaler),
            retailer: PartySnapshot::from(&retailer),
            items_summary: order.items_summary(),
            item_count: order.item_count(),
            order_total: order.total_amount,
            distance_km,
            delivery_fee: state.fees.fee_for(distance_km),
            status: DeliveryStatus::Available,
            created_at: now,
            updated_at: now,
            accepted_by: None,
            accepted_at: None,
        };

        order.status = DeliveryStatus::Available.order_status();
        order.wholesaler_id = Some(session.uid.clone());
        order.delivery_id = Some(delivery.id.clone());
        order.updated_at = now;

        txn.set(paths::available_delivery(&delivery.id), &delivery)?;
        txn.set(order_path, &order)?;
        stage_notification(
            txn,
            now,
            retailer_uid,
            NotificationKind::Order,
            format!("{} packed your order and is looking for a vehicle", delivery.wholesaler.name),
            Some(&order.id),
        )?;
        stage_activity(txn, now, &session.uid, "pack_order", format!("order {order_id}"))?;
        Ok(delivery)
    });
    observe(state, "pack", started, &result);
    let delivery = result?;

    refresh_pool_gauge(state);
    info!(
        delivery_id = %delivery.id,
        order_id,
        distance_km = delivery.distance_km,
        fee = delivery.delivery_fee,
        "delivery published"
    );
    Ok(delivery)
}

/// The pool as vehicle owners see it: only entries still up for grabs,
/// oldest first.
pub fn list_available(state: &AppState) -> Result<Vec<AvailableDelivery>, AppError> {
    let mut deliveries: Vec<AvailableDelivery> = state
        .store
        .children_as::<AvailableDelivery>(paths::AVAILABLE_DELIVERIES)?
        .into_iter()
        .map(|(_, delivery)| delivery)
        .filter(|delivery| delivery.status == DeliveryStatus::Available)
        .collect();

    deliveries.sort_by_key(|delivery| delivery.created_at);
    Ok(deliveries)
}

pub fn list_accepted(
    state: &AppState,
    admin: &Session,
) -> Result<Vec<AcceptedDeliveryRecord>, AppError> {
    admin.require(&[Role::Admin])?;

    let mut records: Vec<AcceptedDeliveryRecord> = state
        .store
        .children_as::<AcceptedDeliveryRecord>(paths::ACCEPTED_DELIVERIES)?
        .into_iter()
        .map(|(_, record)| record)
        .collect();

    records.sort_by_key(|record| Reverse(record.accepted_at));
    Ok(records)
}

/// `available → accepted`. The status check happens inside the
/// transaction, so of two racing vehicle owners exactly one wins and the
/// other gets a conflict with nothing written.
pub fn accept_delivery(
    state: &AppState,
    session: &Session,
    delivery_id: &str,
) -> Result<AcceptedDeliveryRecord, AppError> {
    session.require(&[Role::VehicleOwner])?;
    session.require_verified()?;

    let started = Instant::now();
    let now = state.clock.now();

    let result = state.store.transaction(|txn| {
        let mut delivery = load_delivery(txn, delivery_id)?;
        ensure_transition(&delivery, DeliveryStatus::Accepted)?;

        let vehicle = load_profile(txn, &session.uid)?;
        let current_location = txn
            .get_as::<VehicleLocation>(&paths::vehicle_location(&session.uid))?
            .map(|location| location.point());

        delivery.status = DeliveryStatus::Accepted;
        delivery.accepted_by = Some(session.uid.clone());
        delivery.accepted_at = Some(now);
        delivery.updated_at = now;

        let active = ActiveDelivery::from_available(&delivery, now);
        let record = AcceptedDeliveryRecord {
            id: delivery.id.clone(),
            order_id: delivery.order_id.clone(),
            vehicle: VehicleSnapshot::from(&vehicle),
            wholesaler: delivery.wholesaler.clone(),
            retailer: delivery.retailer.clone(),
            delivery_fee: delivery.delivery_fee,
            status: DeliveryStatus::Accepted,
            accepted_at: now,
            updated_at: now,
            current_location,
            completed_at: None,
        };

        txn.set(paths::available_delivery(&delivery.id), &delivery)?;
        txn.set(paths::active_delivery(&session.uid, &delivery.id), &active)?;
        txn.set(paths::accepted_delivery(&delivery.id), &record)?;
        stage_order_status(txn, &delivery, DeliveryStatus::Accepted, now, |order| {
            order.assigned_vehicle = Some(session.uid.clone());
        })?;
        stage_notification(
            txn,
            now,
            &delivery.retailer.uid,
            NotificationKind::Delivery,
            format!(
                "{} accepted your delivery and is heading to {}",
                vehicle.name, delivery.wholesaler.name
            ),
            Some(&delivery.order_id),
        )?;
        let details = format!("delivery {}", delivery.id);
        stage_activity(txn, now, &session.uid, "accept_delivery", details)?;
        Ok(record)
    });
    observe(state, "accept", started, &result);
    let record = result?;

    refresh_pool_gauge(state);
    info!(delivery_id, vehicle = %session.uid, "delivery accepted");
    Ok(record)
}

/// `accepted → in_progress`: goods picked up from the wholesaler.
pub fn start_delivery(
    state: &AppState,
    session: &Session,
    delivery_id: &str,
) -> Result<AvailableDelivery, AppError> {
    session.require(&[Role::VehicleOwner])?;

    let started = Instant::now();
    let now = state.clock.now();

    let result = state.store.transaction(|txn| {
        let mut delivery = load_delivery(txn, delivery_id)?;
        ensure_assignee(&delivery, session)?;
        ensure_transition(&delivery, DeliveryStatus::InProgress)?;

        delivery.status = DeliveryStatus::InProgress;
        delivery.updated_at = now;

        txn.set(paths::available_delivery(&delivery.id), &delivery)?;
        stage_record_status(txn, &delivery.id, DeliveryStatus::InProgress, now, |_| {})?;
        stage_order_status(txn, &delivery, DeliveryStatus::InProgress, now, |_| {})?;
        stage_notification(
            txn,
            now,
            &delivery.retailer.uid,
            NotificationKind::Delivery,
            format!("Your order was picked up from {}", delivery.wholesaler.name),
            Some(&delivery.order_id),
        )?;
        let details = format!("delivery {}", delivery.id);
        stage_activity(txn, now, &session.uid, "start_delivery", details)?;
        Ok(delivery)
    });
    observe(state, "start", started, &result);
    let delivery = result?;

    info!(delivery_id, vehicle = %session.uid, "delivery started");
    Ok(delivery)
}

/// `accepted | in_progress → completed`. The entry is copied into the
/// completed list and rewritten in place in the active list; it is not
/// removed from the active list.
pub fn complete_delivery(
    state: &AppState,
    session: &Session,
    delivery_id: &str,
) -> Result<ActiveDelivery, AppError> {
    session.require(&[Role::VehicleOwner])?;

    let started = Instant::now();
    let now = state.clock.now();

    let result = state.store.transaction(|txn| {
        let active_path = paths::active_delivery(&session.uid, delivery_id);
        let mut active: ActiveDelivery = txn.get_as(&active_path)?.ok_or_else(|| {
            AppError::NotFound(format!("delivery {delivery_id} is not in your active list"))
        })?;
        if active.status != ActiveDeliveryStatus::InTransit {
            return Err(AppError::Conflict(format!(
                "delivery {delivery_id} is no longer in transit"
            )));
        }

        let mut delivery = load_delivery(txn, delivery_id)?;
        ensure_assignee(&delivery, session)?;
        ensure_transition(&delivery, DeliveryStatus::Completed)?;

        active.status = ActiveDeliveryStatus::Completed;
        active.completed_at = Some(now);

        delivery.status = DeliveryStatus::Completed;
        delivery.updated_at = now;

        let mut stats: VehicleStats = txn
            .get_as(&paths::vehicle_stats(&session.uid))?
            .unwrap_or_default();
        stats.completed_deliveries += 1;
        let earnings = stats.total_earnings + active.delivery_fee;
        stats.total_earnings = (earnings * 100.0).round() / 100.0;
        stats.last_completed_at = Some(now);

        txn.set(active_path, &active)?;
        txn.set(paths::completed_delivery(&session.uid, delivery_id), &active)?;
        txn.set(paths::available_delivery(delivery_id), &delivery)?;
        txn.set(paths::vehicle_stats(&session.uid), &stats)?;
        stage_record_status(txn, delivery_id, DeliveryStatus::Completed, now, |record| {
            record.completed_at = Some(now);
        })?;
        stage_order_status(txn, &delivery, DeliveryStatus::Completed, now, |_| {})?;
        stage_notification(
            txn,
            now,
            &delivery.retailer.uid,
            NotificationKind::Delivery,
            format!("Your order {} has been delivered", delivery.order_id),
            Some(&delivery.order_id),
        )?;
        let details = format!("delivery {delivery_id}");
        stage_activity(txn, now, &session.uid, "complete_delivery", details)?;
        Ok(active)
    });
    observe(state, "complete", started, &result);
    let active = result?;

    info!(delivery_id, vehicle = %session.uid, fee = active.delivery_fee, "delivery completed");
    Ok(active)
}

/// Admin cancellation. Cancels the order and, when it was already
/// published, every delivery projection derived from it.
pub fn cancel_order(
    state: &AppState,
    admin: &Session,
    owner_uid: &str,
    order_id: &str,
    reason: Option<&str>,
) -> Result<Order, AppError> {
    admin.require(&[Role::Admin])?;

    let started = Instant::now();
    let now = state.clock.now();

    let result = state.store.transaction(|txn| {
        let (order_path, mut order) = find_order(txn, owner_uid, order_id)?;
        if order.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "order {order_id} is already {}",
                order.status.as_str()
            )));
        }

        order.status = OrderStatus::Cancelled;
        order.cancelled_by = Some(admin.uid.clone());
        order.cancelled_at = Some(now);
        order.updated_at = now;
        txn.set(order_path, &order)?;

        if let Some(delivery_id) = order.delivery_id.as_deref() {
            cancel_delivery(txn, delivery_id, now)?;
        }

        let message = match reason.map(str::trim).filter(|reason| !reason.is_empty()) {
            Some(reason) => format!("Your order {order_id} was cancelled by an admin: {reason}"),
            None => format!("Your order {order_id} was cancelled by an admin"),
        };
        stage_notification(txn, now, owner_uid, NotificationKind::Order, message, Some(order_id))?;
        stage_activity(txn, now, &admin.uid, "cancel_order", format!("order {order_id}"))?;
        Ok(order)
    });
    observe(state, "cancel", started, &result);
    let order = result?;

    refresh_pool_gauge(state);
    info!(order_id, admin = %admin.uid, "order cancelled");
    Ok(order)
}

/// Admin override of an order's status. Touches only the order itself,
/// plus the owner's inbox and the admin's activity log, all in one write.
pub fn update_order_status(
    state: &AppState,
    admin: &Session,
    owner_uid: &str,
    order_id: &str,
    status: OrderStatus,
) -> Result<Order, AppError> {
    admin.require(&[Role::Admin])?;

    let started = Instant::now();
    let now = state.clock.now();

    let result = state.store.transaction(|txn| {
        let (order_path, mut order) = find_order(txn, owner_uid, order_id)?;
        let previous = order.status;

        order.status = status;
        order.updated_at = now;
        txn.set(order_path, &order)?;

        stage_notification(
            txn,
            now,
            owner_uid,
            NotificationKind::Order,
            format!("Your order {order_id} is now {}", status.as_str()),
            Some(order_id),
        )?;
        stage_activity(
            txn,
            now,
            &admin.uid,
            "update_order_status",
            format!("order {order_id}: {} -> {}", previous.as_str(), status.as_str()),
        )?;
        Ok(order)
    });
    observe(state, "update_status", started, &result);
    let order = result?;

    info!(order_id, admin = %admin.uid, status = status.as_str(), "order status overridden");
    Ok(order)
}

fn load_delivery(txn: &Txn<'_>, delivery_id: &str) -> Result<AvailableDelivery, AppError> {
    txn.get_as(&paths::available_delivery(delivery_id))?
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} no longer exists")))
}

fn ensure_transition(delivery: &AvailableDelivery, next: DeliveryStatus) -> Result<(), AppError> {
    if delivery.status.can_transition_to(next) {
        return Ok(());
    }
    Err(AppError::Conflict(format!(
        "delivery {} is {}; cannot move to {}",
        delivery.id,
        delivery.status.as_str(),
        next.as_str()
    )))
}

fn ensure_assignee(delivery: &AvailableDelivery, session: &Session) -> Result<(), AppError> {
    if delivery.accepted_by.as_deref() == Some(session.uid.as_str()) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "delivery {} is not assigned to you",
        delivery.id
    )))
}

/// Orders are owned by the retailer, but admins address them by owner uid
/// without knowing the role; look under every role.
fn find_order(txn: &Txn<'_>, owner_uid: &str, order_id: &str) -> Result<(String, Order), AppError> {
    for role in Role::ALL {
        let path = paths::order(role, owner_uid, order_id);
        if let Some(order) = txn.get_as::<Order>(&path)? {
            return Ok((path, order));
        }
    }
    Err(AppError::NotFound(format!("order {order_id} not found")))
}

fn stage_order_status(
    txn: &mut Txn<'_>,
    delivery: &AvailableDelivery,
    status: DeliveryStatus,
    now: DateTime<Utc>,
    edit: impl FnOnce(&mut Order),
) -> Result<(), AppError> {
    let path = paths::order(Role::Retailer, &delivery.retailer.uid, &delivery.order_id);
    let Some(mut order) = txn.get_as::<Order>(&path)? else {
        warn!(order_id = %delivery.order_id, delivery_id = %delivery.id, "source order is gone");
        return Ok(());
    };

    order.status = status.order_status();
    order.updated_at = now;
    edit(&mut order);
    txn.set(path, &order)
}

fn stage_record_status(
    txn: &mut Txn<'_>,
    delivery_id: &str,
    status: DeliveryStatus,
    now: DateTime<Utc>,
    edit: impl FnOnce(&mut AcceptedDeliveryRecord),
) -> Result<(), AppError> {
    let path = paths::accepted_delivery(delivery_id);
    let Some(mut record) = txn.get_as::<AcceptedDeliveryRecord>(&path)? else {
        return Ok(());
    };

    record.status = status;
    record.updated_at = now;
    edit(&mut record);
    txn.set(path, &record)
}

fn cancel_delivery(
    txn: &mut Txn<'_>,
    delivery_id: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let pool_path = paths::available_delivery(delivery_id);
    let Some(mut delivery) = txn.get_as::<AvailableDelivery>(&pool_path)? else {
        return Ok(());
    };
    if !delivery.status.can_transition_to(DeliveryStatus::Cancelled) {
        return Ok(());
    }

    delivery.status = DeliveryStatus::Cancelled;
    delivery.updated_at = now;
    txn.set(pool_path, &delivery)?;
    stage_record_status(txn, delivery_id, DeliveryStatus::Cancelled, now, |_| {})?;

    if let Some(vehicle_uid) = delivery.accepted_by.as_deref() {
        let active_path = paths::active_delivery(vehicle_uid, delivery_id);
        if let Some(mut active) = txn.get_as::<ActiveDelivery>(&active_path)? {
            active.status = ActiveDeliveryStatus::Cancelled;
            txn.set(active_path, &active)?;
        }
        stage_notification(
            txn,
            now,
            vehicle_uid,
            NotificationKind::Delivery,
            format!("Delivery {delivery_id} was cancelled by an admin"),
            Some(delivery_id),
        )?;
    }

    Ok(())
}

fn observe<T>(state: &AppState, transition: &str, started: Instant, result: &Result<T, AppError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(AppError::Conflict(_)) => "conflict",
        Err(_) => "error",
    };

    state
        .metrics
        .transitions_total
        .with_label_values(&[transition, outcome])
        .inc();
    state
        .metrics
        .transition_latency_seconds
        .with_label_values(&[transition])
        .observe(started.elapsed().as_secs_f64());

    if let Err(err) = result {
        warn!(transition, error = %err, "transition rejected");
    }
}

fn refresh_pool_gauge(state: &AppState) {
    match list_available(state) {
        Ok(pool) => state.metrics.available_deliveries.set(pool.len() as i64),
        Err(err) => warn!(error = %err, "failed to count available deliveries"),
    }
}
