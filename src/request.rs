//! Request descriptors: the identity of one logical backend call.

use std::fmt;

use reqwest::Method;
use serde::Serialize;

use crate::error::{CineError, Result};

/// A query parameter value. Lists keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

impl QueryValue {
    /// Wire form: lists are comma-joined, which the backend splits again.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Single(value) => value.clone(),
            Self::List(values) => values.join(","),
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Single(value.to_string())
    }
}

macro_rules! query_value_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for QueryValue {
            fn from(value: $ty) -> Self {
                Self::Single(value.to_string())
            }
        })*
    };
}

query_value_from_number!(u8, u16, u32, u64, i32, i64, usize, f32, f64);

impl<T: Into<String>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// One logical request to the backend.
///
/// ```
/// use cineverse_client::request::RequestDescriptor;
///
/// let request = RequestDescriptor::get("/movies/")
///     .query("sort", "imdb_rating_desc")
///     .query("page", 1u32);
/// assert!(request.is_read_only());
/// assert_eq!(request.path_and_query(), "/movies/?sort=imdb_rating_desc&page=1");
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    path: String,
    method: Method,
    query: Vec<(String, QueryValue)>,
    body: Option<serde_json::Value>,
    bearer: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            path,
            method,
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a query parameter only when a value is present.
    pub fn query_opt<V: Into<QueryValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Fill in the credential only if the descriptor carries none.
    pub fn with_default_bearer(mut self, token: Option<&str>) -> Self {
        if self.bearer.is_none() {
            self.bearer = token.map(ToString::to_string);
        }
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn query_params(&self) -> &[(String, QueryValue)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Look up the first value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&QueryValue> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// GET and HEAD are read-only and cacheable; everything else mutates.
    pub fn is_read_only(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Reject methods the backend contract does not use.
    pub fn validate(&self) -> Result<()> {
        let supported = [
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ];
        if !supported.contains(&self.method) {
            return Err(CineError::InvalidArgument(format!(
                "unsupported method {} for {}",
                self.method, self.path
            )));
        }
        Ok(())
    }

    /// Path plus the query string in insertion order, as sent on the wire.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(&v.to_query_string())))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }

    /// Stable query serialization: keys sorted, list values kept in order.
    pub fn canonical_query(&self) -> String {
        let mut pairs: Vec<(&str, String)> = self
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_query_string()))
            .collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set, keeping
/// commas so list values stay readable.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
