//! Cineverse client layer
//!
//! Mediates every call from the movie-discovery client to its backend. The
//! backend may be asleep on a free hosting tier, so the layer:
//!
//! - retries transient failures with capped exponential backoff, giving the
//!   first attempt a long timeout to absorb a cold start,
//! - serves repeated reads from a TTL cache keyed by request identity,
//! - purges the affected cache entries after a successful mutation,
//! - keeps the backend warm with a background heartbeat,
//! - lets UI bootstrap wait until the backend answers its health check.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use cineverse_client::prelude::*;
//!
//! # async fn example() -> cineverse_client::error::Result<()> {
//! let client = CineClient::new(CineConfig::from_env()?)?;
//! client.start()?;
//! client.readiness().wait_for_backend(Duration::from_secs(60)).await?;
//!
//! let movies = client
//!     .list_movies(&MovieQuery::builder().page(1).build())
//!     .await?;
//! println!("{movies}");
//!
//! client.destroy().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod heartbeat;
pub mod invalidation;
pub mod prelude;
pub mod readiness;
pub mod request;
pub mod transport;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
