//! Aggregation core: caching, hedged fetch, orchestration, enrichment.
//!
//! Providers plug in through the ports in `common`; everything in this
//! crate is provider-agnostic. `DetailsService` assembles the live
//! snapshot for a beach and `EnrichService` layers the two-day forecast
//! on top of it.

pub mod beaches;
pub mod cache;
pub mod cached;
pub mod details;
pub mod enrich;
pub mod hedge;

pub use beaches::BeachDirectory;
pub use cache::{Clock, SystemClock, TtlCache};
pub use cached::{CachedBeachForecast, CachedFlag, CachedSlotForecast, CachedUv, CachedWeather};
pub use details::DetailsService;
pub use enrich::EnrichService;
pub use hedge::HedgedWeather;
