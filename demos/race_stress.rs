//! High-volume stress run for replica races.
//!
//! Fires many concurrent races against in-memory replicas with different
//! latencies and failure modes, bounded by a semaphore, then prints how often
//! each replica won. Set `RUST_LOG=race_get=debug` to watch individual races.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use race_get::{
    memory::{MemoryFetcher, Response},
    Context, RaceClient, RaceConfig,
};
use tokio::sync::{mpsc, Semaphore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NUM_CALLS: usize = 5_000;
const MAX_IN_FLIGHT: usize = 256;
const KEY: &str = "user:42";

#[derive(Debug)]
enum CallOutcome {
    Ok {
        address: String,
        latency: Duration,
    },
    Err {
        error: String,
        latency: Duration,
    },
}

#[derive(Debug)]
struct CallResult {
    call_idx: usize,
    outcome: CallOutcome,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let fetcher = MemoryFetcher::new()
        .respond("replica-a", KEY, Response::value("alice").after(Duration::from_millis(5)))
        .respond("replica-b", KEY, Response::value("alice").after(Duration::from_millis(15)))
        .respond("replica-c", KEY, Response::error("connection refused"))
        .empty("replica-d");
    let addresses = ["replica-a", "replica-b", "replica-c", "replica-d", "replica-a"];

    let client = RaceClient::new(fetcher, RaceConfig::low_latency());

    let (tx, mut rx) = mpsc::channel::<CallResult>(MAX_IN_FLIGHT * 2);
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let consumer = tokio::spawn(async move {
        let mut results: Vec<CallResult> = Vec::with_capacity(NUM_CALLS);
        while let Some(res) = rx.recv().await {
            results.push(res);
        }
        results
    });

    let started = Instant::now();
    for i in 0..NUM_CALLS {
        let client = client.clone();
        let tx = tx.clone();
        let sem = semaphore.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };

            let ctx = Context::with_timeout(client.config().overall_timeout);
            let start = Instant::now();
            let res = client.get(&ctx, &addresses, KEY).await;
            let latency = start.elapsed();

            let outcome = match res {
                Ok(won) => CallOutcome::Ok {
                    address: won.address.unwrap_or_default(),
                    latency,
                },
                Err(e) => CallOutcome::Err {
                    error: e.to_string(),
                    latency,
                },
            };

            let _ = tx
                .send(CallResult {
                    call_idx: i,
                    outcome,
                })
                .await;
        });
    }

    drop(tx);
    let mut results = consumer.await?;
    let wall = started.elapsed();

    results.sort_by_key(|r| r.call_idx);

    let mut wins: HashMap<String, usize> = HashMap::new();
    let mut total_latency: HashMap<String, Duration> = HashMap::new();
    let mut error_count = 0usize;

    for r in &results {
        match &r.outcome {
            CallOutcome::Ok { address, latency } => {
                *wins.entry(address.clone()).or_insert(0) += 1;
                *total_latency.entry(address.clone()).or_insert(Duration::ZERO) += *latency;
            }
            CallOutcome::Err { error, latency } => {
                tracing::warn!(call = r.call_idx, ?latency, %error, "race failed");
                error_count += 1;
            }
        }
    }

    println!("\n=== summary ===");
    println!("total races          : {}", results.len());
    println!("successes            : {}", results.len() - error_count);
    println!("errors (any kind)    : {}", error_count);
    println!("wall time            : {:?}", wall);

    for (address, count) in wins.iter() {
        let avg_ms = total_latency[address].as_secs_f64() * 1000.0 / (*count as f64);
        println!(
            "address {:>10}: wins = {:6}, avg_latency = {:8.3} ms",
            address, count, avg_ms,
        );
    }

    for (address, stats) in client.address_stats() {
        println!(
            "client stats {:>10}: wins = {:6}, errors = {:6}",
            address, stats.wins, stats.errors
        );
    }

    Ok(())
}
