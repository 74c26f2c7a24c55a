use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::user::Role;
use crate::nav::authorization::RouteDecision;
use crate::session::Session;
use crate::state::AppState;

pub const CLIENT_HEADER: &str = "x-client-id";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/navigation/authorize", post(authorize))
        .route("/navigation/mounted", post(mounted))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub current_path: String,
    #[serde(default)]
    pub allowed_roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct MountedRequest {
    pub path: String,
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Option<Session>,
    Json(payload): Json<AuthorizeRequest>,
) -> Result<Json<RouteDecision>, AppError> {
    let client = client_id(&headers, session.as_ref())?;
    let decision = state.navigation.for_client(&client).authorize(
        session.map(|session| session.role),
        &payload.current_path,
        &payload.allowed_roles,
    );

    if matches!(decision, RouteDecision::Blocked { .. }) {
        state.metrics.navigation_blocks_total.inc();
    }
    Ok(Json(decision))
}

async fn mounted(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Option<Session>,
    Json(payload): Json<MountedRequest>,
) -> Result<StatusCode, AppError> {
    let client = client_id(&headers, session.as_ref())?;
    state.navigation.for_client(&client).mounted(&payload.path);
    Ok(StatusCode::NO_CONTENT)
}

/// Guards are per browser tab when the client names itself, otherwise per
/// user. Anonymous callers must name themselves so one visitor's loop never
/// blocks another's.
fn client_id(headers: &HeaderMap, session: Option<&Session>) -> Result<String, AppError> {
    headers
        .get(CLIENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| session.map(|session| session.uid.clone()))
        .ok_or_else(|| {
            AppError::BadRequest(format!("anonymous callers must send {CLIENT_HEADER}"))
        })
}
