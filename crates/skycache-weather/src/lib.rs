//! Cache-aside weather retrieval for Skycache
//!
//! Resolves a location to forecast data from a Redis cache, falling back to
//! the Visual Crossing timeline API on a miss and storing the fresh payload
//! for 60 seconds.

pub mod cache;
pub mod codec;
pub mod error;
pub mod location;
pub mod provider;
pub mod render;
pub mod resolver;
pub mod types;

pub use cache::{CacheLookup, CacheStore, MemoryCache, RedisCache};
pub use error::{CacheError, CodecError, FetchError, ResolveError};
pub use location::CacheKey;
pub use provider::{WeatherFetcher, WeatherProvider};
pub use render::{HtmlRenderer, JsonRenderer, RenderFormat, WeatherRenderer};
pub use resolver::{WeatherResolver, CACHE_TTL};
pub use types::*;
