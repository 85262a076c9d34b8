use std::sync::Arc;

use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::engine::registry::{ParcelRegistry, SequentialTrackingNumbers};
use crate::identity::{IdentityContext, JwtVerifier};
use crate::models::tracking::TrackingUpdate;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub registry: ParcelRegistry,
    pub identity: IdentityContext,
    pub tracking_events_tx: broadcast::Sender<TrackingUpdate>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(registry: ParcelRegistry, identity: IdentityContext, event_buffer_size: usize) -> Self {
        let (tracking_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            registry,
            identity,
            tracking_events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = ParcelRegistry::new(
            Box::new(SequentialTrackingNumbers::new(config.tracking_prefix.clone())),
            clock.clone(),
            config.booking_max_attempts,
        );
        let identity = IdentityContext::new(
            Arc::new(JwtVerifier::new(config.jwt_secret.as_bytes())),
            clock,
        );

        Self::new(registry, identity, config.event_buffer_size)
    }
}
