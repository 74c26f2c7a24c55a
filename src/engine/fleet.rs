use std::cmp::Reverse;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::engine::users::{list_users, load_profile};
use crate::error::AppError;
use crate::models::delivery::ActiveDelivery;
use crate::models::user::Role;
use crate::models::vehicle::{VehicleActivity, VehicleLocation, VehicleOverview, VehicleStats};
use crate::session::Session;
use crate::state::AppState;
use crate::store::paths;

/// Age limits of the last location fix for the admin fleet view.
#[derive(Debug, Clone, Copy)]
pub struct ActivityThresholds {
    pub active_within: Duration,
    pub idle_within: Duration,
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            active_within: Duration::from_secs(5 * 60),
            idle_within: Duration::from_secs(15 * 60),
        }
    }
}

impl ActivityThresholds {
    pub fn classify(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> VehicleActivity {
        let Some(last_update) = last_update else {
            return VehicleActivity::Offline;
        };

        let age = (now - last_update).to_std().unwrap_or(Duration::ZERO);
        if age < self.active_within {
            VehicleActivity::Active
        } else if age < self.idle_within {
            VehicleActivity::Idle
        } else {
            VehicleActivity::Offline
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationTick {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Overwrites the caller's last known position. Only accepted while the
/// vehicle owner is online.
pub fn record_location(
    state: &AppState,
    session: &Session,
    tick: LocationTick,
) -> Result<VehicleLocation, AppError> {
    session.require(&[Role::VehicleOwner])?;

    if !(-90.0..=90.0).contains(&tick.lat) || !(-180.0..=180.0).contains(&tick.lng) {
        return Err(AppError::BadRequest(format!(
            "coordinates out of range: {}, {}",
            tick.lat, tick.lng
        )));
    }

    let location = VehicleLocation {
        lat: tick.lat,
        lng: tick.lng,
        accuracy: tick.accuracy,
        updated_at: state.clock.now(),
    };

    state.store.transaction(|txn| {
        let profile = load_profile(txn, &session.uid)?;
        if !profile.online {
            return Err(AppError::Conflict(
                "location sharing is stopped; go online first".to_string(),
            ));
        }
        txn.set(paths::vehicle_location(&session.uid), &location)
    })?;

    debug!(uid = %session.uid, lat = location.lat, lng = location.lng, "location updated");
    Ok(location)
}

/// Vehicle owners may read their own records; admins may read anyone's.
pub fn ensure_can_view(session: &Session, uid: &str) -> Result<(), AppError> {
    if session.role == Role::Admin || (session.role == Role::VehicleOwner && session.uid == uid) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!("cannot view vehicle {uid}")))
}

/// Entries of the vehicle's active list, most recently accepted first.
/// Completed deliveries stay in this list with their status rewritten.
pub fn active_deliveries(state: &AppState, uid: &str) -> Result<Vec<ActiveDelivery>, AppError> {
    let mut deliveries = collect(state, &paths::active_deliveries(uid))?;
    deliveries.sort_by_key(|delivery| Reverse(delivery.accepted_at));
    Ok(deliveries)
}

pub fn completed_deliveries(state: &AppState, uid: &str) -> Result<Vec<ActiveDelivery>, AppError> {
    let mut deliveries = collect(state, &paths::completed_deliveries(uid))?;
    deliveries.sort_by_key(|delivery| Reverse(delivery.completed_at));
    Ok(deliveries)
}

pub fn stats(state: &AppState, uid: &str) -> Result<VehicleStats, AppError> {
    Ok(state
        .store
        .get_as(&paths::vehicle_stats(uid))?
        .unwrap_or_default())
}

/// Admin fleet view: every vehicle owner with activity classification.
pub fn overview(state: &AppState, admin: &Session) -> Result<Vec<VehicleOverview>, AppError> {
    admin.require(&[Role::Admin])?;
    let now = state.clock.now();

    list_users(state, Some(Role::VehicleOwner))
        .into_iter()
        .map(|vehicle| {
            let location: Option<VehicleLocation> =
                state.store.get_as(&paths::vehicle_location(&vehicle.uid))?;
            let activity = state
                .activity
                .classify(location.as_ref().map(|loc| loc.updated_at), now);

            Ok(VehicleOverview {
                active_deliveries: state.store.count(&paths::active_deliveries(&vehicle.uid)),
                stats: stats(state, &vehicle.uid)?,
                uid: vehicle.uid,
                name: vehicle.name,
                vehicle_number: vehicle.vehicle_number,
                activity,
                location,
            })
        })
        .collect()
}

fn collect(state: &AppState, path: &str) -> Result<Vec<ActiveDelivery>, AppError> {
    Ok(state
        .store
        .children_as::<ActiveDelivery>(path)?
        .into_iter()
        .map(|(_, delivery)| delivery)
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::ActivityThresholds;
    use crate::models::vehicle::VehicleActivity;

    #[test]
    fn classification_follows_five_and_fifteen_minute_marks() {
        let thresholds = ActivityThresholds::default();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(
            thresholds.classify(Some(now - Duration::minutes(4)), now),
            VehicleActivity::Active
        );
        assert_eq!(
            thresholds.classify(Some(now - Duration::minutes(5)), now),
            VehicleActivity::Idle
        );
        assert_eq!(
            thresholds.classify(Some(now - Duration::minutes(14)), now),
            VehicleActivity::Idle
        );
        assert_eq!(
            thresholds.classify(Some(now - Duration::minutes(15)), now),
            VehicleActivity::Offline
        );
        assert_eq!(thresholds.classify(None, now), VehicleActivity::Offline);
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let thresholds = ActivityThresholds::default();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            thresholds.classify(Some(now + Duration::seconds(30)), now),
            VehicleActivity::Active
        );
    }
}
