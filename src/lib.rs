//! Fetch a key from whichever replica answers first.
//!
//! Given a key and a list of candidate addresses, this crate queries every
//! unique address concurrently and returns the first successful answer.
//! Failing addresses are tolerated, slower ones are canceled once a winner is
//! known, and the whole race is bounded by a caller-supplied [`Context`].
//!
//! # Quick Start
//!
//! ```no_run
//! use race_get::{memory::MemoryFetcher, Context, RaceClient, RaceConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = MemoryFetcher::new()
//!     .error("replica-a", "user:42", "connection refused")
//!     .value("replica-b", "user:42", "alice");
//!
//! let client = RaceClient::new(fetcher, RaceConfig::default());
//!
//! let ctx = Context::with_timeout(Duration::from_millis(50));
//! let won = client.get(&ctx, &["replica-a", "replica-b"], "user:42").await?;
//! println!("{:?} answered {}", won.address, won.value);
//! # Ok(())
//! # }
//! ```
//!
//! # Outcomes
//!
//! A race ends in exactly one of:
//! 1. the first successful value
//! 2. [`RaceError::AllFailed`] when every address failed, carrying each failure
//! 3. [`RaceError::Canceled`] when the context was canceled or its deadline
//!    elapsed first
//!
//! An empty address list succeeds with the default value unless the client is
//! configured with [`RaceConfig::strict`].
//!
//! # Fetchers
//!
//! The transport is anything implementing [`Fetcher`]. Attempts are abandoned
//! cooperatively: a fetcher must stop waiting once its context is done, which
//! [`Context::run`] handles for any future.

pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod fetch;
pub mod memory;
pub mod race;

pub use client::{AddressStatsSnapshot, RaceClient};
pub use config::{EmptyAddresses, RaceConfig};
pub use context::{CancelOnDrop, Context, ContextError};
pub use errors::{AttemptFailure, FetchError, RaceError};
pub use fetch::Fetcher;
pub use race::{get, unique_addresses, Retrieved};
