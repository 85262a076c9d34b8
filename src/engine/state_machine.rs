use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::AppError;
use crate::models::parcel::{Parcel, ParcelStatus, Priority};
use crate::models::tracking::{SYSTEM_ACTOR, TrackingEvent};

const HANDLING_FEE: Decimal = Decimal::from_parts(500, 0, 0, false, 2);
const RATE_PER_KG: Decimal = Decimal::from_parts(200, 0, 0, false, 2);
const INSURANCE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub const INITIAL_LOCATION: &str = "Parcel Service Center";
pub const INITIAL_DESCRIPTION: &str = "Parcel booking confirmed";

pub fn allowed_transitions(status: ParcelStatus) -> &'static [ParcelStatus] {
    use ParcelStatus::*;

    match status {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[PickedUp, Cancelled],
        PickedUp => &[InTransit, Returned],
        InTransit => &[OutForDelivery, Returned],
        OutForDelivery => &[Delivered, Returned],
        Delivered | Returned | Cancelled => &[],
    }
}

pub fn is_terminal(status: ParcelStatus) -> bool {
    allowed_transitions(status).is_empty()
}

pub fn validate_transition(current: ParcelStatus, requested: ParcelStatus) -> Result<(), AppError> {
    if allowed_transitions(current).contains(&requested) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { current, requested })
    }
}

pub fn compute_initial_event(now: DateTime<Utc>) -> TrackingEvent {
    TrackingEvent {
        sequence: 1,
        status: ParcelStatus::Pending,
        location: INITIAL_LOCATION.to_string(),
        description: Some(INITIAL_DESCRIPTION.to_string()),
        timestamp: now,
        updated_by: SYSTEM_ACTOR.to_string(),
    }
}

/// Flat handling fee, per-kg rate and insurance on the declared value.
pub fn base_rate(weight: Decimal, declared_value: Decimal) -> Decimal {
    HANDLING_FEE + (RATE_PER_KG * weight) + (INSURANCE_RATE * declared_value)
}

pub fn priority_multiplier(priority: Priority) -> Decimal {
    match priority {
        Priority::Standard => Decimal::ONE,
        Priority::Express => Decimal::new(15, 1),
        Priority::Overnight => Decimal::TWO,
    }
}

pub fn shipping_cost(weight: Decimal, declared_value: Decimal, priority: Priority) -> Decimal {
    (base_rate(weight, declared_value) * priority_multiplier(priority))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Lower bound of each priority's delivery window.
pub fn lead_time(priority: Priority) -> Duration {
    match priority {
        Priority::Standard => Duration::days(5),
        Priority::Express => Duration::days(2),
        Priority::Overnight => Duration::days(1),
    }
}

pub fn estimated_delivery(now: DateTime<Utc>, priority: Priority) -> DateTime<Utc> {
    now + lead_time(priority)
}

/// Derived parcel fields that follow an accepted event.
pub fn apply_event(parcel: &mut Parcel, event: &TrackingEvent) {
    parcel.updated_at = event.timestamp;
    if event.status == ParcelStatus::Delivered && parcel.actual_delivery_date.is_none() {
        parcel.actual_delivery_date = Some(event.timestamp);
    }
}
