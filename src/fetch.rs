use std::future::Future;

use crate::{context::Context, errors::FetchError};

/// The capability a race is run over: look up `key` at `address`.
///
/// Implementations may be a network client, a local cache or a test double.
/// The coordinator relies on three things:
///
/// - when `ctx` is done the returned future resolves promptly with
///   [`FetchError::Context`] instead of waiting on the underlying operation
///   ([`Context::run`] does this for any future);
/// - a missing key or unreachable address is an `Err`, never an empty value;
/// - the future is `Send`, since every attempt runs on its own task.
pub trait Fetcher: Send + Sync + 'static {
    /// The value stored under a key. `Default` is returned for an empty
    /// address list.
    type Value: Default + Send + 'static;

    fn fetch(
        &self,
        ctx: &Context,
        address: &str,
        key: &str,
    ) -> impl Future<Output = Result<Self::Value, FetchError>> + Send;
}
