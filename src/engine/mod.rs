pub mod fleet;
pub mod kyc;
pub mod lifecycle;
pub mod notify;
pub mod users;
