use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::MaybePrincipal;
use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::engine::query::{self, StatusChange};
use crate::error::AppError;
use crate::models::booking::BookingRequest;
use crate::models::parcel::ParcelView;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/parcels/book", post(book_parcel))
        .route("/api/parcels/my-parcels", get(my_parcels))
        .route("/api/parcels/sent", get(sent_parcels))
        .route("/api/parcels/received", get(received_parcels))
        .route("/api/parcels/all", get(all_parcels))
        .route("/api/parcels/status/:status", get(parcels_by_status))
        .route("/api/parcels/:id", get(get_parcel))
        .route("/api/parcels/:id/status", put(update_parcel_status))
}

async fn book_parcel(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
    ApiJson(payload): ApiJson<BookingRequest>,
) -> Result<Json<ParcelView>, AppError> {
    query::book(&state, caller.principal(), payload).map(Json)
}

async fn my_parcels(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
) -> Result<Json<Vec<ParcelView>>, AppError> {
    query::list_mine(&state, caller.principal()).map(Json)
}

async fn sent_parcels(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
) -> Result<Json<Vec<ParcelView>>, AppError> {
    query::list_sent(&state, caller.principal()).map(Json)
}

async fn received_parcels(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
) -> Result<Json<Vec<ParcelView>>, AppError> {
    query::list_received(&state, caller.principal()).map(Json)
}

async fn all_parcels(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
) -> Result<Json<Vec<ParcelView>>, AppError> {
    query::list_all(&state, caller.principal()).map(Json)
}

async fn parcels_by_status(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
    ApiPath(status): ApiPath<String>,
) -> Result<Json<Vec<ParcelView>>, AppError> {
    query::list_by_status(&state, caller.principal(), &status).map(Json)
}

async fn get_parcel(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ParcelView>, AppError> {
    query::get_parcel(&state, caller.principal(), id).map(Json)
}

async fn update_parcel_status(
    State(state): State<Arc<AppState>>,
    caller: MaybePrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<StatusChange>,
) -> Result<Json<ParcelView>, AppError> {
    let (view, _event) = query::update_status(&state, caller.principal(), id, payload)?;
    Ok(Json(view))
}
