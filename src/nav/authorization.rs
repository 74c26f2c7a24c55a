use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::models::user::Role;
use crate::nav::guard::NavigationGuard;

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Caller may see the route.
    Render,
    /// Show a spinner; a redirect is either pointless or already under way.
    Loading,
    Redirect { to: String },
    /// The guard tripped for `to`; show the retrying screen.
    Blocked { to: String },
}

#[derive(Debug, Clone)]
struct RedirectMark {
    path: String,
    at_ms: i64,
}

/// Decides what a protected route should do for the current caller.
pub struct RouteAuthorizer {
    guard: Arc<NavigationGuard>,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    last_redirect: Mutex<Option<RedirectMark>>,
}

impl RouteAuthorizer {
    pub fn new(guard: Arc<NavigationGuard>, clock: Arc<dyn Clock>, debounce: Duration) -> Self {
        Self {
            guard,
            clock,
            debounce,
            last_redirect: Mutex::new(None),
        }
    }

    pub fn guard(&self) -> &Arc<NavigationGuard> {
        &self.guard
    }

    /// `role` is `None` for unauthenticated callers. An empty `allowed`
    /// list admits every authenticated role.
    pub fn authorize(
        &self,
        role: Option<Role>,
        current_path: &str,
        allowed: &[Role],
    ) -> RouteDecision {
        let target = match role {
            None => LOGIN_PATH,
            Some(role) if allowed.is_empty() || allowed.contains(&role) => {
                return RouteDecision::Render;
            }
            Some(role) => role.dashboard_path(),
        };

        if current_path == target {
            return RouteDecision::Loading;
        }

        if self.guard.is_blocked(target) {
            return RouteDecision::Blocked {
                to: target.to_string(),
            };
        }

        let now = self.clock.now_ms();
        let mut last = self
            .last_redirect
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(mark) = last.as_ref() {
            let gap = now - mark.at_ms;
            if mark.path == target && gap < debounce_ms(self.debounce) {
                debug!(target, gap_ms = gap, "redirect debounced");
                return RouteDecision::Loading;
            }
        }

        if !self.guard.can_navigate(target) {
            warn!(from = current_path, target, "redirect loop suspected; navigation blocked");
            return RouteDecision::Blocked {
                to: target.to_string(),
            };
        }

        *last = Some(RedirectMark {
            path: target.to_string(),
            at_ms: now,
        });

        RouteDecision::Redirect {
            to: target.to_string(),
        }
    }

    /// Arriving at `path` proves the last redirect there was not a loop.
    pub fn mounted(&self, path: &str) {
        self.guard.reset(Some(path));
    }
}

fn debounce_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{LOGIN_PATH, RouteAuthorizer, RouteDecision};
    use crate::clock::ManualClock;
    use crate::models::user::Role;
    use crate::nav::guard::{GuardConfig, NavigationGuard};

    fn authorizer() -> (RouteAuthorizer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(5_000_000));
        let guard = Arc::new(NavigationGuard::new(GuardConfig::default(), clock.clone()));
        (
            RouteAuthorizer::new(guard, clock.clone(), Duration::from_millis(1000)),
            clock,
        )
    }

    #[test]
    fn allowed_role_renders() {
        let (auth, _clock) = authorizer();
        let decision = auth.authorize(Some(Role::Admin), "/admin-dashboard", &[Role::Admin]);
        assert_eq!(decision, RouteDecision::Render);
    }

    #[test]
    fn wrong_role_is_sent_to_own_dashboard() {
        let (auth, _clock) = authorizer();
        let decision = auth.authorize(Some(Role::Retailer), "/admin-dashboard", &[Role::Admin]);
        assert_eq!(
            decision,
            RouteDecision::Redirect {
                to: "/retailer-dashboard".to_string()
            }
        );
    }

    #[test]
    fn already_on_target_renders_loading_instead_of_redirecting() {
        let (auth, _clock) = authorizer();
        let decision = auth.authorize(
            Some(Role::VehicleOwner),
            "/vehicle-dashboard",
            &[Role::Admin, Role::Wholesaler],
        );

        assert_eq!(decision, RouteDecision::Loading);
        assert_eq!(auth.guard().tracked_paths(), 0);
    }

    #[test]
    fn unauthenticated_caller_goes_to_login() {
        let (auth, _clock) = authorizer();
        let decision = auth.authorize(None, "/wholesaler-dashboard", &[Role::Wholesaler]);
        assert_eq!(
            decision,
            RouteDecision::Redirect {
                to: LOGIN_PATH.to_string()
            }
        );
    }

    #[test]
    fn second_redirect_within_a_second_is_debounced() {
        let (auth, clock) = authorizer();

        let first = auth.authorize(Some(Role::Retailer), "/admin-dashboard", &[Role::Admin]);
        clock.advance_ms(100);
        let second = auth.authorize(Some(Role::Retailer), "/admin-dashboard", &[Role::Admin]);

        assert!(matches!(first, RouteDecision::Redirect { .. }));
        assert_eq!(second, RouteDecision::Loading);
        assert_eq!(
            auth.guard().attempt("/retailer-dashboard").map(|a| a.count),
            Some(1)
        );

        clock.advance_ms(1_000);
        let third = auth.authorize(Some(Role::Retailer), "/admin-dashboard", &[Role::Admin]);
        assert!(matches!(third, RouteDecision::Redirect { .. }));
    }

    #[test]
    fn looping_redirects_trip_the_guard() {
        let (auth, clock) = authorizer();

        let mut decisions = Vec::new();
        for _ in 0..6 {
            decisions.push(auth.authorize(None, "/admin-dashboard", &[Role::Admin]));
            clock.advance_ms(1_001);
        }

        assert!(decisions[..5].iter().all(|d| matches!(d, RouteDecision::Redirect { .. })));
        assert_eq!(
            decisions[5],
            RouteDecision::Blocked {
                to: LOGIN_PATH.to_string()
            }
        );
    }

    #[test]
    fn blocked_guard_short_circuits() {
        let (auth, _clock) = authorizer();
        for _ in 0..6 {
            auth.guard().can_navigate("/wholesaler-dashboard");
        }

        let decision =
            auth.authorize(Some(Role::Wholesaler), "/retailer-dashboard", &[Role::Retailer]);
        assert_eq!(
            decision,
            RouteDecision::Blocked {
                to: "/wholesaler-dashboard".to_string()
            }
        );
    }

    #[test]
    fn mounting_clears_the_guard_for_that_path() {
        let (auth, _clock) = authorizer();
        for _ in 0..6 {
            auth.guard().can_navigate("/login");
        }

        auth.mounted("/login");
        assert!(!auth.guard().is_blocked("/login"));
    }
}
