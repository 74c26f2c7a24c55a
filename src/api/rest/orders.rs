use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};

use crate::engine::lifecycle::{self, PlaceOrder};
use crate::error::AppError;
use crate::models::delivery::AvailableDelivery;
use crate::models::order::Order;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/pending", get(list_pending))
        .route("/orders/:retailer_uid/:order_id/pack", post(pack_order))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<PlaceOrder>,
) -> Result<Json<Order>, AppError> {
    lifecycle::place_order(&state, &session, payload).map(Json)
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Order>>, AppError> {
    lifecycle::list_own_orders(&state, &session).map(Json)
}

async fn list_pending(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Order>>, AppError> {
    lifecycle::list_pending_orders(&state, &session).map(Json)
}

async fn pack_order(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path((retailer_uid, order_id)): Path<(String, String)>,
) -> Result<Json<AvailableDelivery>, AppError> {
    lifecycle::pack_order(&state, &session, &retailer_uid, &order_id).map(Json)
}
