//! Persona Core
//!
//! Domain vocabulary, port traits, and error handling for the Persona
//! inference pipeline. Every other crate in the workspace speaks in terms of
//! the types defined here.

pub mod auction;
pub mod error;
pub mod fingerprint;
pub mod ports;
pub mod profile;
pub mod retry;
pub mod source;

pub use auction::{AuctionRequest, AuctionResult, BidRecord, FactorImpact, FactorRecord};
pub use error::{Error, Result};
pub use fingerprint::{FingerprintKey, FingerprintRecord, GeoEnrichment, ScreenInfo};
pub use ports::{StoreConnector, StoreHandle};
pub use profile::{DeviceTier, IncomeLevel, ProfileResult};
pub use retry::{Backoff, RetryPolicy, retry};
pub use source::{ProviderTier, Source};
