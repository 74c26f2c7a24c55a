use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::delivery::{AcceptedDeliveryRecord, ActiveDelivery, AvailableDelivery};
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries/available", get(list_available))
        .route("/deliveries/:id/accept", post(accept))
        .route("/deliveries/:id/start", post(start))
        .route("/deliveries/:id/complete", post(complete))
}

async fn list_available(
    State(state): State<Arc<AppState>>,
    _session: Session,
) -> Result<Json<Vec<AvailableDelivery>>, AppError> {
    lifecycle::list_available(&state).map(Json)
}

async fn accept(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<AcceptedDeliveryRecord>, AppError> {
    lifecycle::accept_delivery(&state, &session, &id).map(Json)
}

async fn start(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<AvailableDelivery>, AppError> {
    lifecycle::start_delivery(&state, &session, &id).map(Json)
}

async fn complete(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<ActiveDelivery>, AppError> {
    lifecycle::complete_delivery(&state, &session, &id).map(Json)
}
