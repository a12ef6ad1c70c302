// Local activity log and server-synced alerts

pub mod types;
pub mod api;
pub mod store;

pub use types::*;
pub use api::{AlertApi, HttpAlertClient};
pub use store::{ActivityState, ActivityStore};
