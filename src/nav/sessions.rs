use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::Clock;
use crate::nav::authorization::RouteAuthorizer;
use crate::nav::guard::{GuardConfig, NavigationGuard};

/// Navigation state per browser client. Each client gets its own guard so a
/// loop in one tab never blocks another user.
pub struct NavigationSessions {
    config: GuardConfig,
    debounce: Duration,
    clock: Arc<dyn Clock>,
    clients: DashMap<String, Arc<RouteAuthorizer>>,
}

impl NavigationSessions {
    pub fn new(config: GuardConfig, debounce: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            debounce,
            clock,
            clients: DashMap::new(),
        }
    }

    pub fn for_client(&self, client_id: &str) -> Arc<RouteAuthorizer> {
        self.clients
            .entry(client_id.to_string())
            .or_insert_with(|| {
                let guard = Arc::new(NavigationGuard::new(self.config, self.clock.clone()));
                Arc::new(RouteAuthorizer::new(guard, self.clock.clone(), self.debounce))
            })
            .clone()
    }

    /// Logout: forget everything recorded for the client.
    pub fn end(&self, client_id: &str) {
        if let Some((_, authorizer)) = self.clients.remove(client_id) {
            authorizer.guard().reset(None);
        }
    }

    pub fn clients(&self) -> usize {
        self.clients.len()
    }

    /// Sweeps every client's guard and drops clients with nothing left to
    /// track. Returns the number of attempt records removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        self.clients.retain(|_, authorizer| {
            removed += authorizer.guard().sweep();
            authorizer.guard().tracked_paths() > 0
        });
        removed
    }
}

pub fn spawn_sweeper(sessions: Arc<NavigationSessions>) -> JoinHandle<()> {
    let period = sessions.config.sweep_interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = sessions.sweep();
            if removed > 0 {
                debug!(removed, clients = sessions.clients(), "swept navigation attempts");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{NavigationSessions, spawn_sweeper};
    use crate::clock::ManualClock;
    use crate::nav::guard::GuardConfig;

    fn sessions(clock: Arc<ManualClock>, sweep_interval: Duration) -> NavigationSessions {
        let config = GuardConfig {
            sweep_interval,
            ..GuardConfig::default()
        };
        NavigationSessions::new(config, Duration::from_millis(1000), clock)
    }

    #[test]
    fn clients_do_not_share_guards() {
        let clock = Arc::new(ManualClock::new(0));
        let sessions = sessions(clock, Duration::from_secs(30));

        let alice = sessions.for_client("alice");
        for _ in 0..6 {
            alice.guard().can_navigate("/login");
        }

        assert!(alice.guard().is_blocked("/login"));
        assert!(!sessions.for_client("bob").guard().is_blocked("/login"));
        assert!(Arc::ptr_eq(&alice, &sessions.for_client("alice")));
    }

    #[test]
    fn end_drops_the_client() {
        let clock = Arc::new(ManualClock::new(0));
        let sessions = sessions(clock, Duration::from_secs(30));
        sessions.for_client("alice").guard().can_navigate("/login");

        sessions.end("alice");
        assert_eq!(sessions.clients(), 0);
    }

    #[test]
    fn sweep_removes_idle_clients() {
        let clock = Arc::new(ManualClock::new(0));
        let sessions = sessions(clock.clone(), Duration::from_secs(30));
        sessions.for_client("idle").guard().can_navigate("/login");
        clock.advance_ms(5_000);
        sessions.for_client("busy").guard().can_navigate("/login");

        assert_eq!(sessions.sweep(), 1);
        assert_eq!(sessions.clients(), 1);
    }

    #[tokio::test]
    async fn sweeper_task_runs_on_interval() {
        let clock = Arc::new(ManualClock::new(0));
        let sessions = Arc::new(sessions(clock.clone(), Duration::from_millis(20)));
        sessions.for_client("alice").guard().can_navigate("/login");
        clock.advance_ms(10_000);

        let handle = spawn_sweeper(sessions.clone());
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(sessions.clients(), 0);
        handle.abort();
    }
}
