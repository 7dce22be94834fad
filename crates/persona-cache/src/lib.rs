//! Result cache for Persona.
//!
//! Cache-aside reads and best-effort writes of generated profiles and auction
//! results, through the cache connection of a [`persona_store::Connections`].
//! An unavailable store reads as a miss and writes as a no-op.

pub mod keys;
pub mod store;
pub mod types;

pub use keys::{auction_key, component_digest, profile_key, summary_digest};
pub use store::ResultCache;
pub use types::{CacheStats, CacheStatsSnapshot, CacheTtls, Lookup, WriteOutcome};
