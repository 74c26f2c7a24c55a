pub mod activity;
pub mod delivery;
pub mod kyc;
pub mod notification;
pub mod order;
pub mod user;
pub mod vehicle;
