//! # Ticker API
//!
//! HTTP client for the Ticker remote service: ticket rendering, template
//! descriptors, user registration/login and history sync. Implements the
//! remote-boundary traits from `ticker-core` ([`ticker_core::RenderClient`]
//! and [`ticker_core::HistoryRemote`]) so the core can be wired to the real
//! service or to test doubles interchangeably.
//!
//! ```no_run
//! use ticker_api::TickerApiClient;
//! use ticker_core::CoreConfig;
//!
//! # async fn example() -> Result<(), ticker_api::ApiError> {
//! let client = TickerApiClient::new(&CoreConfig::from_env())?;
//! let styles = client.styles().await?;
//! let descriptor = client.template(&styles[0]).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod types;

pub use client::{ApiError, TickerApiClient};
pub use types::{HealthStatus, HistoryItem, UserProfile};
