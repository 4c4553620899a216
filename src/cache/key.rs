//! Structured cache keys.
//!
//! A key is the request path plus its canonical query (and a body digest for
//! the rare read that carries one). Alongside the text, every key records a
//! [`KeyScope`]: the entity kind the path addresses and, where the path names
//! one, its numeric id. Invalidation matches on the scope instead of on
//! substrings of the text.

use std::fmt;

use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

use crate::request::RequestDescriptor;

/// Entity namespace a cached response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    MovieList,
    Movie,
    Search,
    Trending,
    Recommendations,
    Library,
    CurrentUser,
    Other,
}

/// Entity kind plus optional id, e.g. `movie#42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyScope {
    pub kind: EntityKind,
    pub id: Option<u64>,
}

impl KeyScope {
    pub fn entity(kind: EntityKind) -> Self {
        Self { kind, id: None }
    }

    pub fn item(kind: EntityKind, id: u64) -> Self {
        Self { kind, id: Some(id) }
    }

    /// Derive the scope from a backend route.
    pub fn from_path(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["movies"] => Self::entity(EntityKind::MovieList),
            ["movies", "search", ..] => Self::entity(EntityKind::Search),
            ["movies", "trending", ..] => Self::entity(EntityKind::Trending),
            ["movies", "recommended", ..] => Self::entity(EntityKind::Recommendations),
            ["movies", id, ..] => match id.parse() {
                Ok(id) => Self::item(EntityKind::Movie, id),
                Err(_) => Self::entity(EntityKind::Other),
            },
            ["users", "me", "library", ..] => Self::entity(EntityKind::Library),
            ["auth", "me"] => Self::entity(EntityKind::CurrentUser),
            ["api", "recommender", "recommendations", user_id, ..] => Self {
                kind: EntityKind::Recommendations,
                id: user_id.parse().ok(),
            },
            ["api", "recommender", ..] => Self::entity(EntityKind::Recommendations),
            _ => Self::entity(EntityKind::Other),
        }
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}#{id}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Deterministic identity of a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: KeyScope,
    text: String,
}

impl CacheKey {
    pub fn for_request(request: &RequestDescriptor) -> Self {
        let mut text = String::new();
        if *request.method() != reqwest::Method::GET {
            text.push_str(request.method().as_str());
            text.push(' ');
        }
        text.push_str(request.path());

        let query = request.canonical_query();
        if !query.is_empty() {
            text.push('?');
            text.push_str(&query);
        }

        // serde_json maps are ordered by key, so `to_string` is canonical.
        if let Some(body) = request.body() {
            let digest = Sha256::digest(body.to_string().as_bytes());
            text.push('#');
            for byte in &digest[..8] {
                text.push_str(&format!("{byte:02x}"));
            }
        }

        Self {
            scope: KeyScope::from_path(request.path()),
            text,
        }
    }

    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Selects cache keys for invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Every key of an entity kind, whatever its id.
    Entity(EntityKind),
    /// Keys of one entity instance.
    Item(EntityKind, u64),
    /// Keys whose text starts with a path prefix.
    PathPrefix(String),
}

impl KeyPattern {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Self::Entity(kind) => key.scope.kind == *kind,
            Self::Item(kind, id) => key.scope.kind == *kind && key.scope.id == Some(*id),
            Self::PathPrefix(prefix) => key.text.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(kind) => write!(f, "{kind}"),
            Self::Item(kind, id) => write!(f, "{kind}#{id}"),
            Self::PathPrefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}
