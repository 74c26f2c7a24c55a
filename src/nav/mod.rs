//! Redirect-loop protection for the browser shell.
//!
//! [`guard::NavigationGuard`] is a per-path circuit breaker and
//! [`authorization::RouteAuthorizer`] decides, per route visit, whether the
//! caller may stay, must wait, or should be sent to their own dashboard.
//! [`sessions::NavigationSessions`] keeps one of each per browser client.
//! None of this is a security control; mutations are re-checked server-side.

pub mod authorization;
pub mod guard;
pub mod sessions;
