//! The race coordinator: one attempt per unique address, first success wins.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::{stream::FuturesUnordered, FutureExt, StreamExt};
use tokio::time::Instant;

use crate::{
    context::Context,
    errors::{AttemptFailure, FetchError, RaceError},
    fetch::Fetcher,
};

/// A value retrieved by a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved<V> {
    pub value: V,
    /// The address that answered first. `None` when the race had no
    /// addresses and succeeded vacuously.
    pub address: Option<String>,
    /// Time from dispatch to the winning answer.
    pub elapsed: Duration,
}

impl<V: Default> Retrieved<V> {
    pub(crate) fn vacuous() -> Self {
        Self {
            value: V::default(),
            address: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Drops repeated addresses, keeping the first occurrence of each.
pub fn unique_addresses<A: AsRef<str>>(addresses: &[A]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(addresses.len());

    addresses
        .iter()
        .map(AsRef::as_ref)
        .filter(|address| seen.insert(*address))
        .map(str::to_owned)
        .collect()
}

/// Fetches `key` from whichever of `addresses` answers first.
///
/// Every unique address gets one attempt on its own task, all bound to a child
/// of `ctx`. The first success is returned and the remaining attempts are
/// canceled without waiting for them to unwind.
///
/// - an empty address list returns the default value
/// - if every address fails, the error is [`RaceError::AllFailed`] holding all
///   of their failures
/// - if `ctx` finishes first, the error is [`RaceError::Canceled`]
///
/// # Example
/// ```no_run
/// use race_get::{memory::MemoryFetcher, race, Context};
/// use std::{sync::Arc, time::Duration};
///
/// # async fn example() -> Result<(), race_get::RaceError> {
/// let fetcher = Arc::new(
///     MemoryFetcher::new()
///         .value("replica-a", "user:42", "alice")
///         .value("replica-b", "user:42", "alice"),
/// );
///
/// let ctx = Context::with_timeout(Duration::from_millis(50));
/// let value = race::get(&ctx, &fetcher, &["replica-a", "replica-b"], "user:42").await?;
/// assert_eq!(value, "alice");
/// # Ok(())
/// # }
/// ```
pub async fn get<F, A>(
    ctx: &Context,
    fetcher: &Arc<F>,
    addresses: &[A],
    key: &str,
) -> Result<F::Value, RaceError>
where
    F: Fetcher,
    A: AsRef<str>,
{
    match race(ctx, fetcher, unique_addresses(addresses), key).await {
        Ok(retrieved) => Ok(retrieved.value),
        Err(RaceError::NoAddresses) => Ok(F::Value::default()),
        Err(e) => Err(e),
    }
}

/// Core race over already deduplicated addresses.
///
/// Reports an empty list as [`RaceError::NoAddresses`]; callers decide whether
/// that is a success.
pub(crate) async fn race<F>(
    ctx: &Context,
    fetcher: &Arc<F>,
    addresses: Vec<String>,
    key: &str,
) -> Result<Retrieved<F::Value>, RaceError>
where
    F: Fetcher,
{
    if addresses.is_empty() {
        return Err(RaceError::NoAddresses);
    }
    if let Some(err) = ctx.err() {
        return Err(RaceError::Canceled(err));
    }

    let start = Instant::now();

    // Shared by every attempt; canceled on every exit path so losers stop.
    let race_ctx = ctx.child();
    let _cancel_losers = race_ctx.cancel_on_drop();

    let mut attempts = FuturesUnordered::new();
    for address in addresses {
        tracing::trace!(%address, key, "dispatching attempt");

        let fetcher = Arc::clone(fetcher);
        let attempt_ctx = race_ctx.clone();
        let attempt_address = address.clone();
        let attempt_key = key.to_owned();

        let handle = tokio::spawn(async move {
            fetcher
                .fetch(&attempt_ctx, &attempt_address, &attempt_key)
                .await
        });
        attempts.push(handle.map(move |joined| (address, joined)));
    }

    let mut failures = Vec::with_capacity(attempts.len());
    let done = ctx.done();
    tokio::pin!(done);

    loop {
        if attempts.is_empty() {
            break;
        }

        tokio::select! {
            biased;
            Some((address, joined)) = attempts.next() => {
                let result = joined.unwrap_or_else(|err| {
                    Err(FetchError::Other(anyhow::anyhow!("attempt task failed: {err}")))
                });

                match result {
                    Ok(value) => {
                        let elapsed = start.elapsed();
                        tracing::debug!(
                            %address,
                            key,
                            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                            abandoned = attempts.len(),
                            "address won the race"
                        );
                        return Ok(Retrieved {
                            value,
                            address: Some(address),
                            elapsed,
                        });
                    }
                    Err(error) => {
                        tracing::debug!(%address, key, %error, "attempt failed");
                        failures.push(AttemptFailure { address, error });
                    }
                }
            }
            err = &mut done => {
                tracing::debug!(key, %err, abandoned = attempts.len(), "race canceled");
                return Err(RaceError::Canceled(err));
            }
        }
    }

    // Attempts that gave up because the caller's context finished are a
    // cancellation, not an address failure.
    if let Some(err) = ctx.err() {
        tracing::debug!(key, %err, "race canceled");
        return Err(RaceError::Canceled(err));
    }

    tracing::debug!(key, failed = failures.len(), "every address failed");
    Err(RaceError::AllFailed { failures })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_addresses_keeps_first_occurrence_order() {
        let got = unique_addresses(&["b", "a", "b", "c", "a"]);
        assert_eq!(got, vec!["b", "a", "c"]);
    }

    #[test]
    fn unique_addresses_accepts_owned_strings() {
        let input = vec!["x".to_string(), "x".to_string()];
        assert_eq!(unique_addresses(&input), vec!["x"]);
        assert!(unique_addresses::<&str>(&[]).is_empty());
    }
}
