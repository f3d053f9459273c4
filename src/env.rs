//! Environment configuration for the simulated replica set.

use std::{env, time::Duration};

use color_eyre::{eyre::eyre, Result};
use race_get::{RaceClient, RaceConfig};

use crate::sim::{Replica, SimulatedFetcher};

const DEFAULT_ADDRESSES: &str = "replica-a=40:10,replica-b=80:5,replica-c=150:0";
const DEFAULT_KEY: &str = "user:42";

/// Dashboard settings read from the environment.
pub struct Settings {
    pub replicas: Vec<Replica>,
    pub key: String,
    pub timeout: Duration,
}

/// Parses one `name=latency_ms[:fail_pct]` entry.
fn parse_replica(entry: &str) -> Result<Replica> {
    let (name, params) = entry
        .split_once('=')
        .ok_or_else(|| eyre!("replica {entry:?} is not name=latency_ms[:fail_pct]"))?;

    let (latency, fail) = match params.split_once(':') {
        Some((latency, fail)) => (latency, Some(fail)),
        None => (params, None),
    };

    let latency_ms: u64 = latency
        .trim()
        .parse()
        .map_err(|e| eyre!("replica {name}: bad latency {latency:?}: {e}"))?;
    let fail_pct: u8 = match fail {
        Some(f) => f
            .trim()
            .parse()
            .map_err(|e| eyre!("replica {name}: bad failure rate {f:?}: {e}"))?,
        None => 0,
    };
    if fail_pct > 100 {
        color_eyre::eyre::bail!("replica {name}: failure rate {fail_pct} exceeds 100");
    }

    Ok(Replica {
        address: name.trim().to_string(),
        latency: Duration::from_millis(latency_ms),
        fail_pct,
    })
}

/// Reads the dashboard settings.
///
/// Looks for the following environment variables:
/// - `RACE_ADDRESSES` (default `replica-a=40:10,replica-b=80:5,replica-c=150:0`)
/// - `RACE_KEY` (default `user:42`)
/// - `RACE_TIMEOUT_MS` (default 2000)
pub fn settings_from_env() -> Result<Settings> {
    let raw = env::var("RACE_ADDRESSES").unwrap_or_else(|_| DEFAULT_ADDRESSES.to_string());
    let replicas = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_replica)
        .collect::<Result<Vec<_>>>()?;

    if replicas.is_empty() {
        color_eyre::eyre::bail!(
            "No replicas configured.\n\
             Set RACE_ADDRESSES, e.g. {DEFAULT_ADDRESSES}"
        );
    }

    let key = env::var("RACE_KEY").unwrap_or_else(|_| DEFAULT_KEY.to_string());
    let timeout = match env::var("RACE_TIMEOUT_MS") {
        Ok(ms) => Duration::from_millis(ms.parse()?),
        Err(_) => RaceConfig::default().overall_timeout,
    };

    Ok(Settings {
        replicas,
        key,
        timeout,
    })
}

/// Builds a race client over the simulated replicas.
pub fn build_client(settings: &Settings) -> RaceClient<SimulatedFetcher> {
    let fetcher = SimulatedFetcher::new(settings.replicas.clone());
    RaceClient::new(fetcher, RaceConfig::default().with_timeout(settings.timeout))
}
