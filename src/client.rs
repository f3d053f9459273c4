use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    config::{EmptyAddresses, RaceConfig},
    context::Context,
    errors::RaceError,
    fetch::Fetcher,
    race::{race, unique_addresses, Retrieved},
};

#[derive(Debug, Default)]
struct AddressStats {
    wins: u64,
    total_latency_ms: f64,
    errors: u64,
}

/// Snapshot of per-address race statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressStatsSnapshot {
    /// Number of races this address won.
    pub wins: u64,
    /// Average latency in milliseconds of winning answers.
    pub avg_latency_ms: f64,
    /// Number of races in which this address failed or ran out of time.
    pub errors: u64,
}

/// Races lookups across replicas through a shared [`Fetcher`].
///
/// Cloning is cheap; clones share the fetcher and the statistics.
pub struct RaceClient<F> {
    fetcher: Arc<F>,
    cfg: RaceConfig,
    stats: Arc<Mutex<HashMap<String, AddressStats>>>,
}

impl<F> Clone for RaceClient<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            cfg: self.cfg.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<F: Fetcher> RaceClient<F> {
    /// Creates a client over `fetcher`.
    ///
    /// # Example
    /// ```no_run
    /// use race_get::{memory::MemoryFetcher, RaceClient, RaceConfig};
    ///
    /// let fetcher = MemoryFetcher::new().value("replica-a", "k", "v");
    /// let client = RaceClient::new(fetcher, RaceConfig::low_latency());
    /// ```
    pub fn new(fetcher: F, cfg: RaceConfig) -> Self {
        Self::from_arc(Arc::new(fetcher), cfg)
    }

    /// Creates a client over a fetcher that is shared elsewhere.
    pub fn from_arc(fetcher: Arc<F>, cfg: RaceConfig) -> Self {
        Self {
            fetcher,
            cfg,
            stats: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    pub fn config(&self) -> &RaceConfig {
        &self.cfg
    }

    /// Returns accumulated statistics for every address seen so far.
    pub fn address_stats(&self) -> HashMap<String, AddressStatsSnapshot> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);

        stats
            .iter()
            .map(|(address, s)| {
                let avg = if s.wins > 0 {
                    s.total_latency_ms / (s.wins as f64)
                } else {
                    0.0
                };

                (
                    address.clone(),
                    AddressStatsSnapshot {
                        wins: s.wins,
                        avg_latency_ms: avg,
                        errors: s.errors,
                    },
                )
            })
            .collect()
    }

    pub fn reset_stats(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Fetches `key` from the fastest of `addresses` within `ctx`.
    ///
    /// Returns the value together with the winning address. Duplicate
    /// addresses are queried once. An empty list follows
    /// [`RaceConfig::empty_addresses`].
    pub async fn get<A: AsRef<str>>(
        &self,
        ctx: &Context,
        addresses: &[A],
        key: &str,
    ) -> Result<Retrieved<F::Value>, RaceError> {
        let contenders = unique_addresses(addresses);
        let outcome = race(ctx, &self.fetcher, contenders.clone(), key).await;

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(retrieved) => {
                if let Some(address) = &retrieved.address {
                    let entry = stats.entry(address.clone()).or_default();
                    entry.wins += 1;
                    entry.total_latency_ms += retrieved.elapsed.as_secs_f64() * 1000.0;
                }
                Ok(retrieved)
            }
            Err(RaceError::NoAddresses) => match self.cfg.empty_addresses {
                EmptyAddresses::Vacuous => Ok(Retrieved::vacuous()),
                EmptyAddresses::Reject => Err(RaceError::NoAddresses),
            },
            Err(RaceError::AllFailed { failures }) => {
                for failure in &failures {
                    stats.entry(failure.address.clone()).or_default().errors += 1;
                }
                Err(RaceError::AllFailed { failures })
            }
            Err(RaceError::Canceled(err)) => {
                for address in contenders {
                    stats.entry(address).or_default().errors += 1;
                }
                Err(RaceError::Canceled(err))
            }
        }
    }

    /// Like [`get`](Self::get), returning only the value.
    pub async fn get_any<A: AsRef<str>>(
        &self,
        ctx: &Context,
        addresses: &[A],
        key: &str,
    ) -> Result<F::Value, RaceError> {
        let retrieved = self.get(ctx, addresses, key).await?;
        Ok(retrieved.value)
    }

    /// Like [`get`](Self::get), bounded by [`RaceConfig::overall_timeout`].
    pub async fn get_with_timeout<A: AsRef<str>>(
        &self,
        addresses: &[A],
        key: &str,
    ) -> Result<Retrieved<F::Value>, RaceError> {
        let ctx = Context::with_timeout(self.cfg.overall_timeout);
        self.get(&ctx, addresses, key).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::{MemoryFetcher, Response};

    #[tokio::test]
    async fn records_winner_and_failures() {
        let fetcher = MemoryFetcher::new()
            .error("a", "k", "connection error")
            .value("b", "k", "v");
        let client = RaceClient::new(fetcher, RaceConfig::default());

        let won = client
            .get_with_timeout(&["a", "b"], "k")
            .await
            .expect("b answers");
        assert_eq!(won.address.as_deref(), Some("b"));
        assert_eq!(won.value, "v");

        // "a" failed, but "b" won, so the failure is not counted.
        let stats = client.address_stats();
        assert_eq!(stats["b"].wins, 1);
        assert!(!stats.contains_key("a"));

        let err = client.get_with_timeout(&["a"], "k").await.unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(client.address_stats()["a"].errors, 1);

        client.reset_stats();
        assert!(client.address_stats().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_against_every_contender() {
        let fetcher = MemoryFetcher::new()
            .respond("a", "k", Response::value("v").after(Duration::from_secs(1)))
            .respond("b", "k", Response::value("v").after(Duration::from_secs(1)));
        let client = RaceClient::new(
            fetcher,
            RaceConfig::default().with_timeout(Duration::from_millis(10)),
        );

        let err = client
            .get_with_timeout(&["a", "b", "a"], "k")
            .await
            .unwrap_err();
        assert!(err.is_cancellation());

        let stats = client.address_stats();
        assert_eq!(stats["a"].errors, 1);
        assert_eq!(stats["b"].errors, 1);
    }

    #[tokio::test]
    async fn empty_list_follows_policy() {
        let vacuous = RaceClient::new(MemoryFetcher::new(), RaceConfig::default());
        let got = vacuous
            .get_with_timeout::<&str>(&[], "k")
            .await
            .expect("vacuous");
        assert_eq!(got.value, "");
        assert_eq!(got.address, None);

        let strict = RaceClient::new(MemoryFetcher::new(), RaceConfig::strict());
        let err = strict.get_with_timeout::<&str>(&[], "k").await.unwrap_err();
        assert!(matches!(err, RaceError::NoAddresses));
    }

    #[tokio::test]
    async fn get_any_returns_only_the_value() {
        let fetcher = MemoryFetcher::new()
            .error("a", "k", "connection error")
            .value("b", "k", "v");
        let client = RaceClient::new(fetcher, RaceConfig::default());
        let ctx = Context::with_timeout(Duration::from_secs(1));

        let value = client.get_any(&ctx, &["a", "b"], "k").await;
        assert_eq!(value.ok().as_deref(), Some("v"));

        let err = client.get_any(&ctx, &["a"], "k").await.unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].address, "a");
        assert_eq!(client.address_stats()["b"].wins, 1);
    }
}
