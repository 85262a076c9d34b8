use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::parcel::{ParcelStatus, ParcelView, Priority};
use crate::models::tracking::TrackingEvent;

/// Anonymous view of a parcel. Contact details, full addresses and the
/// declared value never appear here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicParcelView {
    pub tracking_number: String,
    pub description: String,
    pub status: ParcelStatus,
    pub priority: Priority,
    pub origin: String,
    pub destination: String,
    pub estimated_delivery_date: DateTime<Utc>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ParcelView> for PublicParcelView {
    fn from(view: &ParcelView) -> Self {
        let parcel = &view.parcel;
        Self {
            tracking_number: parcel.tracking_number.clone(),
            description: parcel.description.clone(),
            status: view.status,
            priority: parcel.priority,
            origin: parcel.pickup.coarse(),
            destination: parcel.delivery.coarse(),
            estimated_delivery_date: parcel.estimated_delivery_date,
            actual_delivery_date: parcel.actual_delivery_date,
            created_at: parcel.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicTrackingEvent {
    pub sequence: u64,
    pub status: ParcelStatus,
    pub location: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&TrackingEvent> for PublicTrackingEvent {
    fn from(event: &TrackingEvent) -> Self {
        Self {
            sequence: event.sequence,
            status: event.status,
            location: event.location.clone(),
            description: event.description.clone(),
            timestamp: event.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicTracking {
    pub parcel: PublicParcelView,
    pub history: Vec<PublicTrackingEvent>,
}
