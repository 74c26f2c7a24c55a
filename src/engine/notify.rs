use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::activity::ActivityLog;
use crate::models::notification::{Notification, NotificationKind};
use crate::state::AppState;
use crate::store::{Txn, paths};

/// Stages one inbox entry for `recipient` on the open transaction.
pub fn stage_notification(
    txn: &mut Txn<'_>,
    now: DateTime<Utc>,
    recipient: &str,
    kind: NotificationKind,
    message: impl Into<String>,
    related_id: Option<&str>,
) -> Result<(), AppError> {
    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        message: message.into(),
        kind,
        created_at: now,
        read: false,
        related_id: related_id.map(str::to_string),
    };

    txn.set(paths::notification(recipient, &notification.id), &notification)
}

pub fn stage_activity(
    txn: &mut Txn<'_>,
    now: DateTime<Utc>,
    actor: &str,
    action: &str,
    details: impl Into<String>,
) -> Result<(), AppError> {
    let log = ActivityLog {
        id: Uuid::new_v4().to_string(),
        actor_id: actor.to_string(),
        action: action.to_string(),
        details: details.into(),
        created_at: now,
    };

    txn.set(paths::activity_log(actor, &log.id), &log)
}

/// Inbox of `uid`, newest first.
pub fn list_notifications(state: &AppState, uid: &str) -> Result<Vec<Notification>, AppError> {
    let mut notifications: Vec<Notification> = state
        .store
        .children_as::<Notification>(&paths::notifications(uid))?
        .into_iter()
        .map(|(_, notification)| notification)
        .collect();

    notifications.sort_by_key(|notification| Reverse(notification.created_at));
    Ok(notifications)
}

pub fn mark_read(state: &AppState, uid: &str, id: &str) -> Result<Notification, AppError> {
    state.store.transaction(|txn| {
        let path = paths::notification(uid, id);
        let mut notification: Notification = txn
            .get_as(&path)?
            .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

        notification.read = true;
        txn.set(path, &notification)?;
        Ok(notification)
    })
}

/// Every user's activity log merged, newest first, capped at `limit`.
pub fn list_activity(state: &AppState, limit: usize) -> Result<Vec<ActivityLog>, AppError> {
    let mut logs: Vec<ActivityLog> = state
        .store
        .children_as::<std::collections::BTreeMap<String, ActivityLog>>(paths::ACTIVITY_LOGS)?
        .into_iter()
        .flat_map(|(_, per_user)| per_user.into_values())
        .collect();

    logs.sort_by_key(|log| Reverse(log.created_at));
    logs.truncate(limit);
    Ok(logs)
}
