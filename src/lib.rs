//! Multi-provider event aggregation pipeline: fans a search out to several
//! external event APIs, normalizes their schemas into one event model,
//! removes near-duplicate listings, scores and ranks results, and returns
//! a paginated envelope.

pub mod apis;
pub mod common;
pub mod config;
pub mod geocoding;
pub mod infra;
pub mod observability;
pub mod pipeline;

pub use common::error::{AggregatorError, Result};
pub use common::types::{
    Category, Coordinates, LocationQuery, NormalizedEvent, PricePreference, PriceRange,
    ResultEnvelope, SearchRequest, SortKey, SourceMetadata, SourcedEvent, TimePreference,
    UserPreferences,
};
pub use config::Config;
pub use pipeline::orchestrator::Aggregator;
