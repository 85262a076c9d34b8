use chrono::{DateTime, Utc};

use crate::engine::state_machine::{compute_initial_event, validate_transition};
use crate::error::AppError;
use crate::models::parcel::ParcelStatus;
use crate::models::tracking::TrackingEvent;

/// Append-only status history of one parcel.
///
/// A ledger always holds at least the initial PENDING event; sequence numbers
/// start at 1 and grow by exactly one per append, and timestamps never go
/// backwards even if the wall clock does.
#[derive(Debug, Clone)]
pub struct TrackingLedger {
    events: Vec<TrackingEvent>,
}

impl TrackingLedger {
    pub fn open(now: DateTime<Utc>) -> Self {
        Self {
            events: vec![compute_initial_event(now)],
        }
    }

    pub fn append(
        &mut self,
        requested: ParcelStatus,
        location: String,
        description: Option<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<&TrackingEvent, AppError> {
        let last = self.last();
        validate_transition(last.status, requested)?;

        let event = TrackingEvent {
            sequence: last.sequence + 1,
            status: requested,
            location,
            description,
            timestamp: now.max(last.timestamp),
            updated_by: actor.to_string(),
        };
        self.events.push(event);

        Ok(self.last())
    }

    pub fn current_status(&self) -> ParcelStatus {
        self.last().status
    }

    pub fn last(&self) -> &TrackingEvent {
        // Non-empty since `open`.
        &self.events[self.events.len() - 1]
    }

    pub fn history(&self) -> &[TrackingEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
