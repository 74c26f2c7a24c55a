use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::engine::fleet::ActivityThresholds;
use crate::geo::FeeSchedule;
use crate::nav::sessions::NavigationSessions;
use crate::observability::metrics::Metrics;
use crate::store::TreeStore;

pub struct AppState {
    pub store: TreeStore,
    pub clock: Arc<dyn Clock>,
    pub navigation: Arc<NavigationSessions>,
    pub fees: FeeSchedule,
    pub activity: ActivityThresholds,
    pub metrics: Metrics,
    pub static_dir: String,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: TreeStore::new(config.event_buffer_size),
            navigation: Arc::new(NavigationSessions::new(
                config.guard,
                config.redirect_debounce,
                clock.clone(),
            )),
            clock,
            fees: config.fees,
            activity: config.activity,
            metrics: Metrics::new(),
            static_dir: config.static_dir.clone(),
        }
    }
}
