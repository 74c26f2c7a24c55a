use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};

use crate::engine::kyc::{self, KycSubmission};
use crate::engine::users::{self, Registration};
use crate::error::AppError;
use crate::models::kyc::KycApplication;
use crate::models::user::UserProfile;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register))
        .route("/me", get(me))
        .route("/session/online", post(go_online))
        .route("/session/offline", post(go_offline))
        .route("/kyc", post(submit_kyc))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Registration>,
) -> Result<Json<UserProfile>, AppError> {
    users::register(&state, payload).map(Json)
}

async fn me(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<UserProfile>, AppError> {
    users::get_profile(&state, &session.uid).map(Json)
}

async fn go_online(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<UserProfile>, AppError> {
    users::set_online(&state, &session, true).map(Json)
}

async fn go_offline(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<UserProfile>, AppError> {
    users::set_online(&state, &session, false).map(Json)
}

async fn submit_kyc(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<KycSubmission>,
) -> Result<Json<KycApplication>, AppError> {
    kyc::submit(&state, &session, payload).map(Json)
}
