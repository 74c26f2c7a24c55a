use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub available_deliveries: IntGauge,
    pub navigation_blocks_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "transitions_total",
                "Lifecycle transitions by transition and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of lifecycle transitions in seconds",
            ),
            &["transition"],
        )
        .expect("valid transition_latency_seconds metric");

        let available_deliveries = IntGauge::new(
            "available_deliveries",
            "Deliveries currently waiting for a vehicle",
        )
        .expect("valid available_deliveries metric");

        let navigation_blocks_total = IntCounter::new(
            "navigation_blocks_total",
            "Redirects refused by the navigation guard",
        )
        .expect("valid navigation_blocks_total metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(available_deliveries.clone()))
            .expect("register available_deliveries");
        registry
            .register(Box::new(navigation_blocks_total.clone()))
            .expect("register navigation_blocks_total");

        Self {
            registry,
            transitions_total,
            transition_latency_seconds,
            available_deliveries,
            navigation_blocks_total,
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
