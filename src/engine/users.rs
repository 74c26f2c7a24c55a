use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::notify::stage_activity;
use crate::error::AppError;
use crate::models::user::{Address, KycStatus, Role, UserProfile};
use crate::models::vehicle::GeoPoint;
use crate::session::{Session, resolve_role};
use crate::state::AppState;
use crate::store::{Txn, paths};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
}

impl Registration {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }

        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(AppError::BadRequest(format!("invalid email: {email}")));
        }

        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if !(10..=13).contains(&digits) {
            return Err(AppError::BadRequest("phone must have 10 to 13 digits".to_string()));
        }

        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.confirm_password {
            return Err(AppError::BadRequest("passwords do not match".to_string()));
        }

        if self.role == Role::Admin {
            return Err(AppError::BadRequest(
                "admin accounts cannot be self-registered".to_string(),
            ));
        }
        if self.role == Role::VehicleOwner
            && self.vehicle_number.as_deref().is_none_or(|n| n.trim().is_empty())
        {
            return Err(AppError::BadRequest(
                "vehicle owners must provide a vehicle number".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn register(state: &AppState, registration: Registration) -> Result<UserProfile, AppError> {
    registration.validate()?;

    let now = state.clock.now();
    let profile = UserProfile {
        uid: Uuid::new_v4().to_string(),
        name: registration.name.trim().to_string(),
        email: registration.email.trim().to_lowercase(),
        phone: registration.phone.trim().to_string(),
        role: registration.role,
        business_name: registration.business_name,
        address: registration.address,
        location: registration.location,
        vehicle_number: registration.vehicle_number,
        kyc_status: KycStatus::NotSubmitted,
        kyc_rejection_reason: None,
        online: false,
        created_at: now,
        updated_at: now,
    };

    state.store.transaction(|txn| {
        let taken = txn
            .get(paths::USERS)
            .and_then(Value::as_object)
            .is_some_and(|users| {
                users.values().any(|user| {
                    user.get("email").and_then(Value::as_str) == Some(profile.email.as_str())
                })
            });
        if taken {
            return Err(AppError::Conflict(format!(
                "email {} is already registered",
                profile.email
            )));
        }

        txn.set(paths::user(&profile.uid), &profile)?;
        let details = format!("registered as {}", profile.role);
        stage_activity(txn, now, &profile.uid, "register", details)
    })?;

    info!(uid = %profile.uid, role = %profile.role, "user registered");
    Ok(profile)
}

/// Creates the operator account if it does not exist yet.
pub fn ensure_admin(state: &AppState, uid: &str, name: &str, email: &str) -> Result<(), AppError> {
    if state.store.exists(&paths::user(uid)) {
        return Ok(());
    }

    let now = state.clock.now();
    let admin = UserProfile {
        uid: uid.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: String::new(),
        role: Role::Admin,
        business_name: None,
        address: Address::default(),
        location: None,
        vehicle_number: None,
        kyc_status: KycStatus::Approved,
        kyc_rejection_reason: None,
        online: false,
        created_at: now,
        updated_at: now,
    };

    state.store.set(&paths::user(uid), &admin)?;
    info!(uid, "admin account created");
    Ok(())
}

pub fn load_profile(txn: &Txn<'_>, uid: &str) -> Result<UserProfile, AppError> {
    let raw = txn
        .get(&paths::user(uid))
        .ok_or_else(|| AppError::NotFound(format!("user {uid} not found")))?;
    decode_profile(uid, raw)
}

pub fn get_profile(state: &AppState, uid: &str) -> Result<UserProfile, AppError> {
    let raw = state
        .store
        .get(&paths::user(uid))
        .ok_or_else(|| AppError::NotFound(format!("user {uid} not found")))?;
    decode_profile(uid, &raw)
}

/// Decodes a stored profile, filling in what older clients left out: the
/// uid comes from the key, the role from the same fallback chain the
/// [`Session`] uses, and missing timestamps fall back to the epoch.
pub fn decode_profile(uid: &str, raw: &Value) -> Result<UserProfile, AppError> {
    let Value::Object(stored) = raw else {
        return Err(AppError::Internal(format!("profile of {uid} is not an object")));
    };
    let role = resolve_role(raw)
        .ok_or_else(|| AppError::Forbidden(format!("user {uid} has no recognizable role")))?;

    let mut fields = stored.clone();
    fields.remove("userType");
    fields.insert("uid".to_string(), Value::String(uid.to_string()));
    fields.insert("role".to_string(), serde_json::to_value(role)?);
    for key in ["name", "email"] {
        fields
            .entry(key)
            .or_insert_with(|| Value::String(String::new()));
    }

    let epoch = serde_json::to_value(DateTime::<Utc>::default())?;
    let created_at = fields.get("createdAt").cloned().unwrap_or(epoch);
    fields
        .entry("updatedAt")
        .or_insert_with(|| created_at.clone());
    fields.entry("createdAt").or_insert(created_at);

    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Registered profiles, oldest first. Nodes that do not decode even after
/// normalization are skipped.
pub fn list_users(state: &AppState, role: Option<Role>) -> Vec<UserProfile> {
    let Some(Value::Object(nodes)) = state.store.get(paths::USERS) else {
        return Vec::new();
    };

    let mut users: Vec<UserProfile> = nodes
        .iter()
        .filter_map(|(uid, node)| match decode_profile(uid, node) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(uid = %uid, error = %err, "skipping malformed user profile");
                None
            }
        })
        .filter(|user| role.is_none_or(|role| user.role == role))
        .collect();

    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    users
}

/// Flips the online flag. Going offline is the logout path: the caller's
/// navigation state is dropped with it.
pub fn set_online(
    state: &AppState,
    session: &Session,
    online: bool,
) -> Result<UserProfile, AppError> {
    let now = state.clock.now();

    let profile = state.store.transaction(|txn| {
        let mut profile = load_profile(txn, &session.uid)?;
        profile.online = online;
        profile.updated_at = now;
        txn.set(paths::user(&session.uid), &profile)?;

        let (action, details) = if online {
            ("login", "went online")
        } else {
            ("logout", "went offline")
        };
        stage_activity(txn, now, &session.uid, action, details)?;
        Ok(profile)
    })?;

    if !online {
        state.navigation.end(&session.uid);
    }

    Ok(profile)
}

/// Removes a user and every subtree keyed by them in one write.
pub fn delete_user(state: &AppState, admin: &Session, uid: &str) -> Result<(), AppError> {
    admin.require(&[Role::Admin])?;
    if admin.uid == uid {
        return Err(AppError::BadRequest("admins cannot delete themselves".to_string()));
    }

    let now = state.clock.now();
    state.store.transaction(|txn| {
        let profile = load_profile(txn, uid)?;

        txn.remove(paths::user(uid));
        txn.remove(paths::orders_of(profile.role, uid));
        txn.remove(paths::notifications(uid));
        txn.remove(paths::activity_logs(uid));
        txn.remove(paths::vehicle(uid));
        txn.remove(paths::kyc_pending(uid));

        stage_activity(
            txn,
            now,
            &admin.uid,
            "delete_user",
            format!("deleted {} ({}, {})", profile.name, profile.email, profile.role),
        )
    })?;

    state.navigation.end(uid);
    info!(uid, admin = %admin.uid, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::decode_profile;
    use crate::models::user::{KycStatus, Role};

    #[test]
    fn legacy_profile_is_normalized() {
        let raw = json!({ "name": "Old Shop", "userType": "Retailer", "kycStatus": "approved" });
        let profile = decode_profile("legacy", &raw).unwrap();

        assert_eq!(profile.uid, "legacy");
        assert_eq!(profile.role, Role::Retailer);
        assert_eq!(profile.kyc_status, KycStatus::Approved);
        assert_eq!(profile.email, "");
        assert_eq!(profile.updated_at, profile.created_at);
    }

    #[test]
    fn nested_role_and_conflicting_keys_decode() {
        let nested = json!({ "name": "V", "profile": { "role": "driver" } });
        assert_eq!(decode_profile("v1", &nested).unwrap().role, Role::VehicleOwner);

        let both = json!({ "name": "W", "role": "wholesaler", "userType": "retailer" });
        assert_eq!(decode_profile("w1", &both).unwrap().role, Role::Wholesaler);
    }

    #[test]
    fn roleless_profile_is_rejected() {
        assert!(decode_profile("x", &json!({ "name": "X" })).is_err());
        assert!(decode_profile("x", &json!("not a profile")).is_err());
    }
}
