//! Response caching: keys, the TTL store and per-request cache policy.

pub mod key;
pub mod store;

pub use key::{CacheKey, EntityKind, KeyPattern, KeyScope};
pub use store::CacheStore;

use std::time::Duration;

use crate::request::RequestDescriptor;

/// How a read interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Store under the store's default TTL.
    #[default]
    Default,
    /// Store under a specific TTL.
    Ttl(Duration),
    /// Always go to the network and never store the result.
    NoStore,
}

impl CachePolicy {
    /// Policy for a read: randomized orderings are never cached and the
    /// current user gets its own, shorter TTL.
    pub fn for_request(request: &RequestDescriptor, current_user_ttl: Duration) -> Self {
        if request
            .query_value("sort")
            .is_some_and(|sort| sort.to_query_string() == "random")
        {
            return Self::NoStore;
        }
        match KeyScope::from_path(request.path()).kind {
            EntityKind::CurrentUser => Self::Ttl(current_user_ttl),
            _ => Self::Default,
        }
    }
}
