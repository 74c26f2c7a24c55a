use serde::Deserialize;
use tracing::info;

use crate::engine::notify::{stage_activity, stage_notification};
use crate::engine::users::load_profile;
use crate::error::AppError;
use crate::models::kyc::KycApplication;
use crate::models::notification::NotificationKind;
use crate::models::user::{KycStatus, Role, UserProfile};
use crate::session::Session;
use crate::state::AppState;
use crate::store::paths;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub business_name: String,
    pub registration_number: String,
    #[serde(default)]
    pub document_names: Vec<String>,
}

pub fn submit(
    state: &AppState,
    session: &Session,
    submission: KycSubmission,
) -> Result<KycApplication, AppError> {
    if session.role == Role::Admin {
        return Err(AppError::BadRequest("admins are not subject to KYC".to_string()));
    }
    if submission.business_name.trim().is_empty() {
        return Err(AppError::BadRequest("business name cannot be empty".to_string()));
    }
    if submission.registration_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "registration number cannot be empty".to_string(),
        ));
    }

    let now = state.clock.now();
    let application = state.store.transaction(|txn| {
        let mut profile = load_profile(txn, &session.uid)?;
        match profile.kyc_status {
            KycStatus::Pending => {
                return Err(AppError::Conflict(
                    "KYC application is already under review".to_string(),
                ));
            }
            KycStatus::Approved => {
                return Err(AppError::Conflict("KYC is already approved".to_string()));
            }
            KycStatus::NotSubmitted | KycStatus::Rejected => {}
        }

        let application = KycApplication {
            uid: session.uid.clone(),
            name: profile.name.clone(),
            role: profile.role,
            business_name: submission.business_name.trim().to_string(),
            registration_number: submission.registration_number.trim().to_string(),
            document_names: submission.document_names,
            submitted_at: now,
        };

        profile.kyc_status = KycStatus::Pending;
        profile.kyc_rejection_reason = None;
        profile.business_name = Some(application.business_name.clone());
        profile.updated_at = now;

        txn.set(paths::kyc_pending(&session.uid), &application)?;
        txn.set(paths::user(&session.uid), &profile)?;
        stage_activity(txn, now, &session.uid, "kyc_submit", "submitted KYC documents")?;
        Ok(application)
    })?;

    info!(uid = %session.uid, "kyc submitted");
    Ok(application)
}

/// Review queue, oldest submission first.
pub fn list_pending(state: &AppState, admin: &Session) -> Result<Vec<KycApplication>, AppError> {
    admin.require(&[Role::Admin])?;

    let mut queue: Vec<KycApplication> = state
        .store
        .children_as::<KycApplication>(paths::KYC_PENDING)?
        .into_iter()
        .map(|(_, application)| application)
        .collect();

    queue.sort_by_key(|application| application.submitted_at);
    Ok(queue)
}

pub fn approve(state: &AppState, admin: &Session, uid: &str) -> Result<UserProfile, AppError> {
    review(state, admin, uid, None)
}

pub fn reject(
    state: &AppState,
    admin: &Session,
    uid: &str,
    reason: &str,
) -> Result<UserProfile, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("a rejection reason is required".to_string()));
    }
    review(state, admin, uid, Some(reason))
}

fn review(
    state: &AppState,
    admin: &Session,
    uid: &str,
    rejection: Option<&str>,
) -> Result<UserProfile, AppError> {
    admin.require(&[Role::Admin])?;

    let now = state.clock.now();
    let profile = state.store.transaction(|txn| {
        let queue_path = paths::kyc_pending(uid);
        if txn.get(&queue_path).is_none() {
            return Err(AppError::NotFound(format!("no pending KYC application for {uid}")));
        }

        let mut profile = load_profile(txn, uid)?;
        profile.updated_at = now;

        let (message, action) = match rejection {
            None => {
                profile.kyc_status = KycStatus::Approved;
                profile.kyc_rejection_reason = None;
                ("Your KYC verification has been approved".to_string(), "kyc_approve")
            }
            Some(reason) => {
                profile.kyc_status = KycStatus::Rejected;
                profile.kyc_rejection_reason = Some(reason.to_string());
                (format!("Your KYC verification was rejected: {reason}"), "kyc_reject")
            }
        };

        txn.remove(queue_path);
        txn.set(paths::user(uid), &profile)?;
        stage_notification(txn, now, uid, NotificationKind::Kyc, message, None)?;
        stage_activity(txn, now, &admin.uid, action, format!("reviewed KYC of {}", profile.name))?;
        Ok(profile)
    })?;

    info!(uid, admin = %admin.uid, status = ?profile.kyc_status, "kyc reviewed");
    Ok(profile)
}
