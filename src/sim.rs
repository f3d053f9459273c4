//! Simulated replicas for the dashboard.

use std::{collections::HashMap, time::Duration};

use rand::Rng;
use race_get::{Context, FetchError, Fetcher};

/// A simulated replica: answers after `latency` plus up to 50% jitter, and
/// fails `fail_pct` percent of the time.
#[derive(Debug, Clone)]
pub struct Replica {
    pub address: String,
    pub latency: Duration,
    pub fail_pct: u8,
}

pub struct SimulatedFetcher {
    replicas: HashMap<String, Replica>,
}

impl SimulatedFetcher {
    pub fn new(replicas: Vec<Replica>) -> Self {
        Self {
            replicas: replicas
                .into_iter()
                .map(|r| (r.address.clone(), r))
                .collect(),
        }
    }
}

impl Fetcher for SimulatedFetcher {
    type Value = String;

    async fn fetch(&self, ctx: &Context, address: &str, key: &str) -> Result<String, FetchError> {
        let Some(replica) = self.replicas.get(address) else {
            return Err(FetchError::Unreachable {
                address: address.to_string(),
                reason: "unknown replica".to_string(),
            });
        };

        let (delay, fails) = {
            let mut rng = rand::thread_rng();
            let jitter_ms = rng.gen_range(0..=replica.latency.as_millis() as u64 / 2);
            let fails = rng.gen_range(0..100u8) < replica.fail_pct;
            (replica.latency + Duration::from_millis(jitter_ms), fails)
        };

        ctx.run(tokio::time::sleep(delay)).await?;

        if fails {
            return Err(FetchError::Unreachable {
                address: address.to_string(),
                reason: "connection reset".to_string(),
            });
        }

        Ok(format!("{key}@{address}"))
    }
}
