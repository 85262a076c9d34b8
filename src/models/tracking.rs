use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::parcel::ParcelStatus;

pub const SYSTEM_ACTOR: &str = "SYSTEM";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingEvent {
    pub sequence: u64,
    pub status: ParcelStatus,
    pub location: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub updated_by: String,
}

/// Published on the event channel after every successful append.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingUpdate {
    pub parcel_id: Uuid,
    pub tracking_number: String,
    pub event: TrackingEvent,
}
