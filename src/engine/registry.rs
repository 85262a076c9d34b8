use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::engine::ledger::TrackingLedger;
use crate::engine::state_machine;
use crate::error::AppError;
use crate::identity::Principal;
use crate::models::booking::BookingRequest;
use crate::models::parcel::{ContactKey, Parcel, ParcelStatus, ParcelView, SenderInfo};
use crate::models::tracking::TrackingEvent;
use crate::policy;

pub trait TrackingNumberSource: Send + Sync {
    fn next_candidate(&self) -> String;
}

/// `{prefix}-{counter}` with a zero-padded process-wide counter. Distinct by
/// construction within one registry; the index claim in [`ParcelRegistry::book`]
/// still guards against numbers that were already taken.
pub struct SequentialTrackingNumbers {
    prefix: String,
    next: AtomicU64,
}

impl SequentialTrackingNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(first),
        }
    }
}

impl TrackingNumberSource for SequentialTrackingNumbers {
    fn next_candidate(&self) -> String {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:010}", self.prefix, value)
    }
}

#[derive(Debug)]
struct ParcelRecord {
    parcel: Parcel,
    ledger: TrackingLedger,
    booked_seq: u64,
}

impl ParcelRecord {
    fn view(&self) -> ParcelView {
        ParcelView {
            parcel: self.parcel.clone(),
            status: self.ledger.current_status(),
        }
    }

    fn append(
        &mut self,
        requested: ParcelStatus,
        location: String,
        description: Option<String>,
        actor: &str,
        clock: &dyn Clock,
    ) -> Result<TrackingEvent, AppError> {
        let event = self
            .ledger
            .append(requested, location, description, actor, clock.now())?
            .clone();
        state_machine::apply_event(&mut self.parcel, &event);
        Ok(event)
    }
}

#[derive(Debug, Clone)]
pub struct Booking {
    pub parcel: ParcelView,
    /// Candidates tried before one could be claimed; 1 without collisions.
    pub attempts: u32,
}

pub struct ParcelRegistry {
    parcels: DashMap<Uuid, Arc<RwLock<ParcelRecord>>>,
    by_tracking: DashMap<String, Uuid>,
    numbers: Box<dyn TrackingNumberSource>,
    clock: Arc<dyn Clock>,
    booked: AtomicU64,
    max_booking_attempts: u32,
}

impl ParcelRegistry {
    pub fn new(
        numbers: Box<dyn TrackingNumberSource>,
        clock: Arc<dyn Clock>,
        max_booking_attempts: u32,
    ) -> Self {
        Self {
            parcels: DashMap::new(),
            by_tracking: DashMap::new(),
            numbers,
            clock,
            booked: AtomicU64::new(0),
            max_booking_attempts: max_booking_attempts.max(1),
        }
    }

    pub fn book(&self, request: BookingRequest, sender: &Principal) -> Result<Booking, AppError> {
        let booking = request.validate()?;
        let now = self.clock.now();

        let mut parcel = Parcel {
            id: Uuid::new_v4(),
            tracking_number: String::new(),
            shipping_cost: state_machine::shipping_cost(
                booking.weight,
                booking.declared_value,
                booking.priority,
            ),
            estimated_delivery_date: state_machine::estimated_delivery(now, booking.priority),
            description: booking.description,
            weight: booking.weight,
            declared_value: booking.declared_value,
            priority: booking.priority,
            sender: SenderInfo {
                user_id: sender.user_id.clone(),
                name: sender.name.clone(),
                email: sender.email.clone(),
            },
            receiver: booking.receiver,
            receiver_self_service: booking.receiver_self_service,
            pickup: booking.pickup,
            delivery: booking.delivery,
            special_instructions: booking.special_instructions,
            actual_delivery_date: None,
            created_at: now,
            updated_at: now,
        };

        for attempt in 1..=self.max_booking_attempts {
            let candidate = self.numbers.next_candidate();
            match self.by_tracking.entry(candidate) {
                Entry::Occupied(taken) => {
                    warn!(
                        tracking_number = %taken.key(),
                        attempt,
                        "tracking number already claimed; retrying"
                    );
                }
                Entry::Vacant(slot) => {
                    parcel.tracking_number = slot.key().clone();
                    let id = parcel.id;
                    let record = ParcelRecord {
                        parcel,
                        ledger: TrackingLedger::open(now),
                        booked_seq: self.booked.fetch_add(1, Ordering::SeqCst),
                    };
                    let view = record.view();

                    // Parcel goes in while the index slot is still held, so a
                    // claimed number always resolves to a complete record.
                    self.parcels.insert(id, Arc::new(RwLock::new(record)));
                    slot.insert(id);

                    info!(
                        parcel_id = %id,
                        tracking_number = %view.parcel.tracking_number,
                        sender = %view.parcel.sender.user_id,
                        "parcel booked"
                    );
                    return Ok(Booking {
                        parcel: view,
                        attempts: attempt,
                    });
                }
            }
        }

        Err(AppError::Conflict(format!(
            "could not allocate a unique tracking number after {} attempts",
            self.max_booking_attempts
        )))
    }

    /// Authorization is checked under the parcel's lock and before the
    /// transition is validated, so a rejected caller learns nothing about
    /// the parcel's current status.
    pub fn update_status(
        &self,
        parcel_id: Uuid,
        requested: ParcelStatus,
        location: String,
        description: Option<String>,
        actor: &Principal,
    ) -> Result<(ParcelView, TrackingEvent), AppError> {
        let record = self.record(parcel_id)?;
        let mut record = record.write();

        if !policy::can_write(actor, &record.parcel) {
            return Err(AppError::Forbidden(format!(
                "{} may not update parcel {}",
                actor.role, parcel_id
            )));
        }

        let event = record.append(
            requested,
            location,
            description,
            &actor.user_id,
            self.clock.as_ref(),
        )?;
        Ok((record.view(), event))
    }

    /// Appends without an authorization check; for trusted internal actors.
    pub fn append(
        &self,
        parcel_id: Uuid,
        requested: ParcelStatus,
        location: String,
        description: Option<String>,
        actor: &str,
    ) -> Result<TrackingEvent, AppError> {
        let record = self.record(parcel_id)?;
        let mut record = record.write();
        record.append(requested, location, description, actor, self.clock.as_ref())
    }

    pub fn get(&self, parcel_id: Uuid) -> Result<ParcelView, AppError> {
        Ok(self.record(parcel_id)?.read().view())
    }

    pub fn current_status(&self, parcel_id: Uuid) -> Result<ParcelStatus, AppError> {
        Ok(self.record(parcel_id)?.read().ledger.current_status())
    }

    pub fn history(&self, parcel_id: Uuid) -> Result<Vec<TrackingEvent>, AppError> {
        Ok(self.record(parcel_id)?.read().ledger.history().to_vec())
    }

    /// Parcel and history read under one lock acquisition.
    pub fn snapshot(&self, parcel_id: Uuid) -> Result<(ParcelView, Vec<TrackingEvent>), AppError> {
        let record = self.record(parcel_id)?;
        let record = record.read();
        Ok((record.view(), record.ledger.history().to_vec()))
    }

    pub fn find_by_tracking_number(&self, tracking_number: &str) -> Result<ParcelView, AppError> {
        let id = self.resolve_tracking_number(tracking_number)?;
        self.get(id)
    }

    pub fn snapshot_by_tracking_number(
        &self,
        tracking_number: &str,
    ) -> Result<(ParcelView, Vec<TrackingEvent>), AppError> {
        let id = self.resolve_tracking_number(tracking_number)?;
        self.snapshot(id)
    }

    pub fn list_by_sender(&self, user_id: &str) -> Vec<ParcelView> {
        self.collect(|parcel, _| parcel.sender.user_id == user_id)
    }

    pub fn list_by_receiver(&self, keys: &[ContactKey]) -> Vec<ParcelView> {
        if keys.is_empty() {
            return Vec::new();
        }

        self.collect(|parcel, _| {
            parcel
                .receiver
                .contact_keys()
                .iter()
                .any(|key| keys.contains(key))
        })
    }

    pub fn list_by_status(&self, status: ParcelStatus) -> Vec<ParcelView> {
        self.collect(|_, current| current == status)
    }

    pub fn list_all(&self) -> Vec<ParcelView> {
        self.collect(|_, _| true)
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    fn record(&self, parcel_id: Uuid) -> Result<Arc<RwLock<ParcelRecord>>, AppError> {
        self.parcels
            .get(&parcel_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("parcel {parcel_id} not found")))
    }

    fn resolve_tracking_number(&self, tracking_number: &str) -> Result<Uuid, AppError> {
        self.by_tracking
            .get(tracking_number.trim())
            .map(|entry| *entry.value())
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "parcel with tracking number {tracking_number} not found"
                ))
            })
    }

    /// Newest booking first.
    fn collect<F>(&self, predicate: F) -> Vec<ParcelView>
    where
        F: Fn(&Parcel, ParcelStatus) -> bool,
    {
        let records: Vec<Arc<RwLock<ParcelRecord>>> = self
            .parcels
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut matched: Vec<(u64, ParcelView)> = records
            .iter()
            .filter_map(|record| {
                let record = record.read();
                if predicate(&record.parcel, record.ledger.current_status()) {
                    Some((record.booked_seq, record.view()))
                } else {
                    None
                }
            })
            .collect();

        matched.sort_by(|a, b| b.0.cmp(&a.0));
        matched.into_iter().map(|(_, view)| view).collect()
    }
}
