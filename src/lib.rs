//! DHMZ radar camera core.
//!
//! Fetches the Croatian meteorological service (DHMZ) rolling radar
//! composite as 25 individual animation frames from vrijeme.hr, caches
//! them with conditional HTTP validators, and assembles a looping
//! animated image for a host automation platform. The host owns entity
//! lifecycle and scheduling; this crate owns fetch, cache invalidation,
//! and compositing.

pub mod config;
pub mod error;
pub mod fetch;
pub mod radar;

pub use config::RadarConfig;
pub use error::{FetchError, RadarError};
pub use fetch::{FrameResponse, GetOutcome, HeadOutcome, HttpFetcher, RadarFetch};
pub use radar::{OutputFormat, RadarCamera, RADAR_MAP_URL_ANIM, RADAR_MAP_URL_STATIC};
