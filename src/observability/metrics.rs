use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_total: IntCounterVec,
    pub status_updates_total: IntCounterVec,
    pub status_update_latency_seconds: HistogramVec,
    pub tracking_number_collisions_total: IntCounter,
    pub public_lookups_total: IntCounterVec,
    pub parcels_registered: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Total booking attempts by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Total status updates by outcome"),
            &["outcome"],
        )
        .expect("valid status_updates_total metric");

        let status_update_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "status_update_latency_seconds",
                "Latency of status update processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid status_update_latency_seconds metric");

        let tracking_number_collisions_total = IntCounter::new(
            "tracking_number_collisions_total",
            "Tracking number candidates rejected because they were already claimed",
        )
        .expect("valid tracking_number_collisions_total metric");

        let public_lookups_total = IntCounterVec::new(
            Opts::new("public_lookups_total", "Public tracking lookups by outcome"),
            &["outcome"],
        )
        .expect("valid public_lookups_total metric");

        let parcels_registered =
            IntGauge::new("parcels_registered", "Number of parcels in the registry")
                .expect("valid parcels_registered metric");

        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(status_update_latency_seconds.clone()))
            .expect("register status_update_latency_seconds");
        registry
            .register(Box::new(tracking_number_collisions_total.clone()))
            .expect("register tracking_number_collisions_total");
        registry
            .register(Box::new(public_lookups_total.clone()))
            .expect("register public_lookups_total");
        registry
            .register(Box::new(parcels_registered.clone()))
            .expect("register parcels_registered");

        Self {
            registry,
            bookings_total,
            status_updates_total,
            status_update_latency_seconds,
            tracking_number_collisions_total,
            public_lookups_total,
            parcels_registered,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
