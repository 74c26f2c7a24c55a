use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use serde::Deserialize;

use crate::engine::{fleet, kyc, lifecycle, notify, users};
use crate::error::AppError;
use crate::models::activity::ActivityLog;
use crate::models::delivery::AcceptedDeliveryRecord;
use crate::models::kyc::KycApplication;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::{Role, UserProfile};
use crate::models::vehicle::VehicleOverview;
use crate::session::Session;
use crate::state::AppState;

const DEFAULT_ACTIVITY_LIMIT: usize = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/:owner_uid/:order_id/status", patch(update_status))
        .route("/admin/orders/:owner_uid/:order_id/cancel", post(cancel_order))
        .route("/admin/deliveries/accepted", get(list_accepted))
        .route("/admin/vehicles", get(list_vehicles))
        .route("/admin/kyc", get(list_kyc))
        .route("/admin/kyc/:uid/approve", post(approve_kyc))
        .route("/admin/kyc/:uid/reject", post(reject_kyc))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:uid", delete(delete_user))
        .route("/admin/activity", get(list_activity))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct UsersQuery {
    pub role: Option<Role>,
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<Order>>, AppError> {
    lifecycle::list_all_orders(&state, &session).map(Json)
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path((owner_uid, order_id)): Path<(String, String)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    lifecycle::update_order_status(&state, &session, &owner_uid, &order_id, payload.status)
        .map(Json)
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path((owner_uid, order_id)): Path<(String, String)>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    lifecycle::cancel_order(
        &state,
        &session,
        &owner_uid,
        &order_id,
        payload.reason.as_deref(),
    )
    .map(Json)
}

async fn list_accepted(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<AcceptedDeliveryRecord>>, AppError> {
    lifecycle::list_accepted(&state, &session).map(Json)
}

async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<VehicleOverview>>, AppError> {
    fleet::overview(&state, &session).map(Json)
}

async fn list_kyc(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Vec<KycApplication>>, AppError> {
    kyc::list_pending(&state, &session).map(Json)
}

async fn approve_kyc(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(uid): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    kyc::approve(&state, &session, &uid).map(Json)
}

async fn reject_kyc(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(uid): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<UserProfile>, AppError> {
    kyc::reject(&state, &session, &uid, &payload.reason).map(Json)
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    session.require(&[Role::Admin])?;
    Ok(Json(users::list_users(&state, query.role)))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    users::delete_user(&state, &session, &uid)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_activity(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLog>>, AppError> {
    session.require(&[Role::Admin])?;
    notify::list_activity(&state, query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT)).map(Json)
}
