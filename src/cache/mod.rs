//! AI response caching.
//!
//! - [`key`]: derives content-addressed, versioned keys from normalized
//!   requests ([`CacheKey`], [`normalize`]).
//! - [`response`]: [`ResponseCache`], a typed get/put layer over the shared
//!   [`KeyValueStore`](crate::store::KeyValueStore) with a 24h default TTL.

pub mod key;
pub mod response;

pub use key::{CacheKey, PlanKeyFields, normalize};
pub use response::{CacheConfig, DEFAULT_RESPONSE_TTL, ResponseCache};
