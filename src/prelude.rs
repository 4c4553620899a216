//! Convenience re-exports for common use.

pub use crate::api::{
    MovieQuery, MovieSort, RecommendationOptions, RecommendationStrategy, Registration, SearchType,
    TrendingWindow,
};
pub use crate::cache::{CacheKey, CachePolicy, CacheStore, EntityKind, KeyPattern};
pub use crate::client::CineClient;
pub use crate::config::CineConfig;
pub use crate::error::{CineError, ErrorKind, Result};
pub use crate::heartbeat::{HeartbeatStatus, Visibility};
pub use crate::invalidation::MutationKind;
pub use crate::readiness::{BootstrapPhase, HealthReport, HealthStatus};
pub use crate::request::RequestDescriptor;
