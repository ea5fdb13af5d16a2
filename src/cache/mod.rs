//! Request-fingerprint response cache.
//!
//! [`compute_key`] turns a request into a stable fingerprint, [`ResponseCache`]
//! holds responses for a TTL window, and [`CacheHook`] plugs both into the
//! model call pipeline.

pub mod clock;
pub mod hook;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hook::{CacheHook, request_key};
pub use key::{CacheKey, ExtraConfig, compute_key};
pub use store::{CacheStats, ResponseCache};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache input: {0}")]
    InvalidInput(&'static str),
}
