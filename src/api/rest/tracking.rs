use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::MaybePrincipal;
use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::engine::query::{self, StatusChange};
use crate::error::AppError;
use crate::models::public::PublicTracking;
use crate::models::tracking::TrackingEvent;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tracking/public/:tracking_number", get(track_public))
        .route("/api/tracking/parcel/:id", get(parcel_history))
        .route("/api/tracking/parcel/:id/update", post(add_tracking_update))
        .route("/api/tracking/user/parcels", get(user_tracking_overview))
}

async fn track_public(
    State(state): State<Arc<AppState>>,
    ApiPath(tracking_number): ApiPath<String>,
) -> Result<Json<PublicTracking>, AppError> {
    query::track_public(&state, &tracking_number).map(Json)
}

async fn parcel_history(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<TrackingEvent>>, AppError> {
    query::history(&state, caller.principal(), id).map(Json)
}

async fn add_tracking_update(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<StatusChange>,
) -> Result<Json<TrackingEvent>, AppError> {
    query::add_tracking_update(&state, caller.principal(), id, payload).map(Json)
}

async fn user_tracking_overview(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
) -> Result<Json<BTreeMap<String, Vec<TrackingEvent>>>, AppError> {
    query::tracking_overview(&state, caller.principal()).map(Json)
}
