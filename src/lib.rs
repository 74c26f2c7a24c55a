pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod models;
pub mod nav;
pub mod observability;
pub mod session;
pub mod state;
pub mod store;
