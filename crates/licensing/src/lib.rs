pub mod cache;
pub mod entitlement;

pub use cache::LicenseCache;
pub use entitlement::{EntitlementChecker, HttpEntitlementChecker, UserState};
