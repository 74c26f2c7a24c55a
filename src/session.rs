//! Caller identity, resolved once per request.
//!
//! Profiles written by older clients carry the role under different keys,
//! so the lookup walks a fallback chain and normalizes the spelling into a
//! [`Role`]. Handlers only ever see the typed [`Session`].

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::models::user::{KycStatus, Role};
use crate::state::AppState;
use crate::store::paths;

pub const USER_HEADER: &str = "x-user-id";

const ROLE_KEYS: [&[&str]; 4] = [&["role"], &["userType"], &["user", "role"], &["profile", "role"]];

#[derive(Debug, Clone)]
pub struct Session {
    pub uid: String,
    pub name: String,
    pub role: Role,
    pub kyc_status: KycStatus,
}

impl Session {
    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            return Ok(());
        }
        Err(AppError::Forbidden(format!(
            "{} may not perform this action",
            self.role
        )))
    }

    /// Admins are verified by definition; everybody else needs an approved
    /// KYC application.
    pub fn require_verified(&self) -> Result<(), AppError> {
        if self.role == Role::Admin || self.kyc_status == KycStatus::Approved {
            return Ok(());
        }
        Err(AppError::Forbidden(
            "KYC verification must be approved first".to_string(),
        ))
    }

    pub fn from_profile(uid: &str, profile: &Value) -> Result<Self, AppError> {
        let role = resolve_role(profile)
            .ok_or_else(|| AppError::Forbidden(format!("user {uid} has no recognizable role")))?;

        let name = profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let kyc_status = profile
            .get("kycStatus")
            .cloned()
            .and_then(|raw| serde_json::from_value(raw).ok())
            .unwrap_or_default();

        Ok(Self {
            uid: uid.to_string(),
            name,
            role,
            kyc_status,
        })
    }
}

/// First parseable role found along the fallback chain.
pub fn resolve_role(profile: &Value) -> Option<Role> {
    ROLE_KEYS.iter().find_map(|keys| {
        let mut node = profile;
        for key in *keys {
            node = node.get(key)?;
        }
        node.as_str()?.parse().ok()
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))?;

        let profile = state.store.get(&paths::user(uid)).ok_or_else(|| {
            warn!(uid, "request from unknown user");
            AppError::Unauthorized(format!("unknown user {uid}"))
        })?;

        Session::from_profile(uid, &profile)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Session, resolve_role};
    use crate::models::user::{KycStatus, Role};

    #[test]
    fn role_key_wins_over_fallbacks() {
        let profile = json!({ "role": "wholesaler", "userType": "retailer" });
        assert_eq!(resolve_role(&profile), Some(Role::Wholesaler));
    }

    #[test]
    fn nested_shapes_are_resolved() {
        assert_eq!(
            resolve_role(&json!({ "user": { "role": "vehicleOwner" } })),
            Some(Role::VehicleOwner)
        );
        assert_eq!(
            resolve_role(&json!({ "profile": { "role": "Admin" } })),
            Some(Role::Admin)
        );
        assert_eq!(resolve_role(&json!({ "userType": "retailer" })), Some(Role::Retailer));
    }

    #[test]
    fn unparseable_role_falls_through_to_next_key() {
        let profile = json!({ "role": 7, "userType": "driver" });
        assert_eq!(resolve_role(&profile), Some(Role::VehicleOwner));
        assert_eq!(resolve_role(&json!({ "role": "ghost" })), None);
    }

    #[test]
    fn session_requires_kyc_for_non_admins() {
        let retailer = Session::from_profile("u1", &json!({ "role": "retailer" })).unwrap();
        assert_eq!(retailer.kyc_status, KycStatus::NotSubmitted);
        assert!(retailer.require_verified().is_err());
        assert!(retailer.require(&[Role::Retailer]).is_ok());
        assert!(retailer.require(&[Role::Admin]).is_err());

        let admin = Session::from_profile("a1", &json!({ "role": "admin" })).unwrap();
        assert!(admin.require_verified().is_ok());
    }
}
