use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};

use crate::engine::fleet::{self, LocationTick};
use crate::error::AppError;
use crate::models::delivery::ActiveDelivery;
use crate::models::vehicle::{VehicleLocation, VehicleStats};
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles/location", post(update_location))
        .route("/vehicles/:uid/deliveries/active", get(active_deliveries))
        .route("/vehicles/:uid/deliveries/completed", get(completed_deliveries))
        .route("/vehicles/:uid/stats", get(stats))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LocationTick>,
) -> Result<Json<VehicleLocation>, AppError> {
    fleet::record_location(&state, &session, payload).map(Json)
}

async fn active_deliveries(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(uid): Path<String>,
) -> Result<Json<Vec<ActiveDelivery>>, AppError> {
    fleet::ensure_can_view(&session, &uid)?;
    fleet::active_deliveries(&state, &uid).map(Json)
}

async fn completed_deliveries(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(uid): Path<String>,
) -> Result<Json<Vec<ActiveDelivery>>, AppError> {
    fleet::ensure_can_view(&session, &uid)?;
    fleet::completed_deliveries(&state, &uid).map(Json)
}

async fn stats(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(uid): Path<String>,
) -> Result<Json<VehicleStats>, AppError> {
    fleet::ensure_can_view(&session, &uid)?;
    fleet::stats(&state, &uid).map(Json)
}
