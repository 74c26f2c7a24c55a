pub mod admin;
pub mod deliveries;
pub mod navigation;
pub mod notifications;
pub mod orders;
pub mod users;
pub mod vehicles;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::state::AppState;
use crate::store::paths;

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.static_dir.clone();

    Router::new()
        .merge(users::router())
        .merge(orders::router())
        .merge(deliveries::router())
        .merge(vehicles::router())
        .merge(notifications::router())
        .merge(navigation::router())
        .merge(admin::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .fallback_service(ServeDir::new(static_dir))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    users: usize,
    orders: usize,
    available_deliveries: usize,
    accepted_deliveries: usize,
    navigation_clients: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        users: state.store.count(paths::USERS),
        orders: count_orders(state.store.get(paths::ORDERS)),
        available_deliveries: state.store.count(paths::AVAILABLE_DELIVERIES),
        accepted_deliveries: state.store.count(paths::ACCEPTED_DELIVERIES),
        navigation_clients: state.navigation.clients(),
    })
}

// orders/{role}/{uid}/{orderId}
fn count_orders(orders: Option<Value>) -> usize {
    let Some(Value::Object(by_role)) = orders else {
        return 0;
    };
    by_role
        .values()
        .filter_map(Value::as_object)
        .flat_map(|by_owner| by_owner.values())
        .filter_map(Value::as_object)
        .map(|orders| orders.len())
        .sum()
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
