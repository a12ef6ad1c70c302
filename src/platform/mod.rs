// Web platform session: device identity, tokens, installation heartbeat

pub mod device;
pub mod storage;
pub mod client;

pub use client::PlatformClient;
pub use storage::{PlatformTokens, TokenStore};
