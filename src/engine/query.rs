//! Boundary between the transport layer and the registry. Every read passes
//! through [`policy`] here; every write is timed, counted and published on
//! the tracking event channel.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::Principal;
use crate::models::booking::BookingRequest;
use crate::models::parcel::{ParcelStatus, ParcelView};
use crate::models::public::{PublicParcelView, PublicTracking, PublicTrackingEvent};
use crate::models::tracking::{TrackingEvent, TrackingUpdate};
use crate::policy;
use crate::state::AppState;

pub const DEFAULT_UPDATE_LOCATION: &str = "System Update";

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn require(principal: Option<&Principal>) -> Result<&Principal, AppError> {
    principal.ok_or_else(|| AppError::Unauthenticated("a bearer token is required".to_string()))
}

pub fn book(
    state: &AppState,
    principal: Option<&Principal>,
    request: BookingRequest,
) -> Result<ParcelView, AppError> {
    let sender = require(principal)?;

    match state.registry.book(request, sender) {
        Ok(booking) => {
            state.metrics.bookings_total.with_label_values(&["success"]).inc();
            let collisions = u64::from(booking.attempts.saturating_sub(1));
            if collisions > 0 {
                state
                    .metrics
                    .tracking_number_collisions_total
                    .inc_by(collisions);
            }
            state.metrics.parcels_registered.set(state.registry.len() as i64);
            Ok(booking.parcel)
        }
        Err(err) => {
            state
                .metrics
                .bookings_total
                .with_label_values(&[err.kind()])
                .inc();
            warn!(sender = %sender.user_id, error = %err, "booking rejected");
            Err(err)
        }
    }
}

/// Plain status change; location and description fall back to defaults.
pub fn update_status(
    state: &AppState,
    principal: Option<&Principal>,
    parcel_id: Uuid,
    change: StatusChange,
) -> Result<(ParcelView, TrackingEvent), AppError> {
    apply_change(state, principal, parcel_id, change, false)
}

/// Tracking update entered by staff; location is mandatory.
pub fn add_tracking_update(
    state: &AppState,
    principal: Option<&Principal>,
    parcel_id: Uuid,
    change: StatusChange,
) -> Result<TrackingEvent, AppError> {
    apply_change(state, principal, parcel_id, change, true).map(|(_, event)| event)
}

fn apply_change(
    state: &AppState,
    principal: Option<&Principal>,
    parcel_id: Uuid,
    change: StatusChange,
    location_required: bool,
) -> Result<(ParcelView, TrackingEvent), AppError> {
    let actor = require(principal)?;
    let start = Instant::now();

    let result = authorize_write(state, actor, parcel_id)
        .and_then(|()| parse_change(change, location_required))
        .and_then(|(status, location, description)| {
            state
                .registry
                .update_status(parcel_id, status, location, description, actor)
        });

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .status_update_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .status_updates_total
        .with_label_values(&[outcome])
        .inc();

    match result {
        Ok((view, event)) => {
            info!(
                parcel_id = %parcel_id,
                tracking_number = %view.parcel.tracking_number,
                status = %event.status,
                sequence = event.sequence,
                actor = %actor.user_id,
                "parcel status updated"
            );
            let _ = state.tracking_events_tx.send(TrackingUpdate {
                parcel_id,
                tracking_number: view.parcel.tracking_number.clone(),
                event: event.clone(),
            });
            Ok((view, event))
        }
        Err(err) => {
            warn!(
                parcel_id = %parcel_id,
                actor = %actor.user_id,
                error = %err,
                "status update rejected"
            );
            Err(err)
        }
    }
}

/// NotFound, then Forbidden, before the request body is looked at. The
/// registry repeats the parcel-level check under the parcel's lock.
fn authorize_write(state: &AppState, actor: &Principal, parcel_id: Uuid) -> Result<(), AppError> {
    if policy::has_write_role(actor) {
        return Ok(());
    }

    state.registry.get(parcel_id)?;
    Err(AppError::Forbidden(format!(
        "{} may not update parcel {}",
        actor.role, parcel_id
    )))
}

fn parse_change(
    change: StatusChange,
    location_required: bool,
) -> Result<(ParcelStatus, String, Option<String>), AppError> {
    let status = change.status.parse::<ParcelStatus>()?;

    let location = match change.location.map(|raw| raw.trim().to_string()) {
        Some(location) if !location.is_empty() => location,
        _ if location_required => {
            return Err(AppError::Validation("location is required".to_string()));
        }
        _ => DEFAULT_UPDATE_LOCATION.to_string(),
    };

    let description = change
        .description
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .or_else(|| Some(format!("Status updated to {status}")));

    Ok((status, location, description))
}

pub fn get_parcel(
    state: &AppState,
    principal: Option<&Principal>,
    parcel_id: Uuid,
) -> Result<ParcelView, AppError> {
    let principal = require(principal)?;
    let view = state.registry.get(parcel_id)?;
    authorize_read(principal, &view)?;
    Ok(view)
}

pub fn history(
    state: &AppState,
    principal: Option<&Principal>,
    parcel_id: Uuid,
) -> Result<Vec<TrackingEvent>, AppError> {
    let principal = require(principal)?;
    let (view, history) = state.registry.snapshot(parcel_id)?;
    authorize_read(principal, &view)?;
    Ok(history)
}

fn authorize_read(principal: &Principal, view: &ParcelView) -> Result<(), AppError> {
    if policy::can_read(Some(principal), &view.parcel) {
        Ok(())
    } else {
        debug!(parcel_id = %view.parcel.id, user = %principal.user_id, "read denied");
        Err(AppError::Forbidden(format!(
            "not allowed to view parcel {}",
            view.parcel.id
        )))
    }
}

pub fn list_sent(state: &AppState, principal: Option<&Principal>) -> Result<Vec<ParcelView>, AppError> {
    let principal = require(principal)?;
    Ok(state.registry.list_by_sender(&principal.user_id))
}

pub fn list_received(
    state: &AppState,
    principal: Option<&Principal>,
) -> Result<Vec<ParcelView>, AppError> {
    let principal = require(principal)?;
    Ok(received_by(state, principal))
}

fn received_by(state: &AppState, principal: &Principal) -> Vec<ParcelView> {
    state
        .registry
        .list_by_receiver(&principal.contact_keys())
        .into_iter()
        .filter(|view| policy::is_receiver(principal, &view.parcel))
        .collect()
}

/// Sent and received parcels, newest first, each parcel once.
pub fn list_mine(state: &AppState, principal: Option<&Principal>) -> Result<Vec<ParcelView>, AppError> {
    let principal = require(principal)?;

    let mut parcels = state.registry.list_by_sender(&principal.user_id);
    for view in received_by(state, principal) {
        if !parcels.iter().any(|mine| mine.parcel.id == view.parcel.id) {
            parcels.push(view);
        }
    }
    parcels.sort_by(|a, b| {
        b.parcel
            .created_at
            .cmp(&a.parcel.created_at)
            .then_with(|| b.parcel.tracking_number.cmp(&a.parcel.tracking_number))
    });
    Ok(parcels)
}

pub fn list_all(state: &AppState, principal: Option<&Principal>) -> Result<Vec<ParcelView>, AppError> {
    let principal = require(principal)?;
    if policy::can_list_all(principal) {
        return Ok(state.registry.list_all());
    }

    scoped(principal, state.registry.list_all())
}

pub fn list_by_status(
    state: &AppState,
    principal: Option<&Principal>,
    status: &str,
) -> Result<Vec<ParcelView>, AppError> {
    let principal = require(principal)?;
    let status = status.parse::<ParcelStatus>()?;
    if policy::can_list_all(principal) {
        return Ok(state.registry.list_by_status(status));
    }

    scoped(principal, state.registry.list_by_status(status))
}

fn scoped(principal: &Principal, parcels: Vec<ParcelView>) -> Result<Vec<ParcelView>, AppError> {
    if !policy::can_list_privileged(principal) {
        return Err(AppError::Forbidden(format!(
            "{} may not list other users' parcels",
            principal.role
        )));
    }

    Ok(parcels
        .into_iter()
        .filter(|view| policy::in_operational_scope(principal, &view.parcel))
        .collect())
}

/// Tracking number to history for every parcel the caller sent or receives.
pub fn tracking_overview(
    state: &AppState,
    principal: Option<&Principal>,
) -> Result<BTreeMap<String, Vec<TrackingEvent>>, AppError> {
    let parcels = list_mine(state, principal)?;

    let mut overview = BTreeMap::new();
    for view in parcels {
        let history = state.registry.history(view.parcel.id)?;
        overview.insert(view.parcel.tracking_number, history);
    }
    Ok(overview)
}

/// Anonymous lookup. The response is minimized the same way for every
/// caller, authenticated or not.
pub fn track_public(state: &AppState, tracking_number: &str) -> Result<PublicTracking, AppError> {
    match state.registry.snapshot_by_tracking_number(tracking_number) {
        Ok((view, history)) => {
            state
                .metrics
                .public_lookups_total
                .with_label_values(&["found"])
                .inc();
            Ok(PublicTracking {
                parcel: PublicParcelView::from(&view),
                history: history.iter().map(PublicTrackingEvent::from).collect(),
            })
        }
        Err(err) => {
            state
                .metrics
                .public_lookups_total
                .with_label_values(&["not_found"])
                .inc();
            debug!(tracking_number, "public lookup missed");
            Err(err)
        }
    }
}
