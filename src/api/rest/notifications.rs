use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};

use crate::engine::notify;
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/:id/read", post(mark_read))
}

async fn list(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Notification>>, AppError> {
    notify::list_notifications(&state, &session.uid).map(Json)
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Notification>, AppError> {
    notify::mark_read(&state, &session.uid, &id).map(Json)
}
