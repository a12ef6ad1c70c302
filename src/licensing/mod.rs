// Entitlement snapshot and the store that keeps it current

pub mod types;
pub mod mapping;
pub mod store;

pub use types::*;
pub use store::{LicenseState, LicenseStore};
