//! End-to-end races over in-memory and hand-written fetchers.

use std::{error::Error as _, sync::Arc, time::Duration};

use race_get::{
    memory::{MemoryFetcher, Response},
    race, Context, ContextError, FetchError, Fetcher, RaceError,
};
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};

const KEY: &str = "key1";

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_address_does_not_block_success() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .error("addr1", KEY, "connection error")
            .value("addr2", KEY, "value2"),
    );
    let ctx = Context::with_timeout(ms(50));

    let got = race::get(&ctx, &fetcher, &["addr1", "addr2"], KEY).await;
    assert_eq!(got.ok().as_deref(), Some("value2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_address_failing_is_an_error() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .error("addr1", KEY, "error 1")
            .error("addr2", KEY, "error 2"),
    );
    let ctx = Context::with_timeout(ms(50));

    let err = race::get(&ctx, &fetcher, &["addr1", "addr2"], KEY)
        .await
        .unwrap_err();

    assert!(!err.is_cancellation());
    let mut failed: Vec<_> = err.failures().iter().map(|f| f.address.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, ["addr1", "addr2"]);
}

#[tokio::test(start_paused = true)]
async fn deadline_beats_slow_address() {
    let fetcher = Arc::new(MemoryFetcher::new().respond(
        "addr1",
        KEY,
        Response::value("value1").after(ms(200)),
    ));
    let ctx = Context::with_timeout(ms(50));
    let start = Instant::now();

    let err = race::get(&ctx, &fetcher, &["addr1"], KEY)
        .await
        .unwrap_err();

    assert!(start.elapsed() < ms(200));
    assert!(err.is_cancellation());
    let cause = err.source().and_then(|s| s.downcast_ref::<ContextError>());
    assert_eq!(cause, Some(&ContextError::DeadlineExceeded));
}

#[tokio::test(start_paused = true)]
async fn fast_address_beats_slow_one() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .respond("addr1", KEY, Response::value("value1").after(ms(200)))
            .respond("addr2", KEY, Response::value("value2").after(ms(50))),
    );
    let ctx = Context::with_timeout(ms(300));
    let start = Instant::now();

    let got = race::get(&ctx, &fetcher, &["addr1", "addr2"], KEY).await;

    assert_eq!(got.ok().as_deref(), Some("value2"));
    assert!(start.elapsed() < ms(200));
}

#[tokio::test]
async fn empty_address_list_is_vacuous_success() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let ctx = Context::with_timeout(ms(50));

    let got = race::get::<_, &str>(&ctx, &fetcher, &[], KEY).await;
    assert_eq!(got.ok().as_deref(), Some(""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_failures_with_one_success() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .empty("addr1")
            .error("addr2", KEY, "connection error")
            .value("addr3", KEY, "value3"),
    );
    let ctx = Context::with_timeout(ms(200));

    let got = race::get(&ctx, &fetcher, &["addr1", "addr2", "addr3"], KEY).await;
    assert_eq!(got.ok().as_deref(), Some("value3"));
}

#[tokio::test]
async fn single_missing_key_carries_not_found() {
    let fetcher = Arc::new(MemoryFetcher::new().empty("addr1"));
    let ctx = Context::with_timeout(ms(50));

    let err = race::get(&ctx, &fetcher, &["addr1"], KEY)
        .await
        .unwrap_err();

    match err {
        RaceError::AllFailed { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].address, "addr1");
            assert!(matches!(failures[0].error, FetchError::NotFound { .. }));
        }
        other => panic!("expected AllFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_addresses_are_queried_once() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .error("addr1", KEY, "err")
            .value("addr2", KEY, "value2"),
    );
    let ctx = Context::with_timeout(ms(100));

    let got = race::get(&ctx, &fetcher, &["addr1", "addr1", "addr2"], KEY).await;

    assert_eq!(got.ok().as_deref(), Some("value2"));
    assert_eq!(fetcher.calls("addr1"), 1);
    assert_eq!(fetcher.calls("addr2"), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicates_do_not_double_count_failures() {
    let fetcher = Arc::new(MemoryFetcher::new().error("addr1", KEY, "err"));
    let ctx = Context::with_timeout(ms(100));

    let err = race::get(&ctx, &fetcher, &["addr1", "addr1", "addr1"], KEY)
        .await
        .unwrap_err();
    assert_eq!(err.failures().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn attempts_run_concurrently() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .respond("a", KEY, Response::error("slow failure").after(ms(100)))
            .respond("b", KEY, Response::error("slow failure").after(ms(100)))
            .respond("c", KEY, Response::value("c").after(ms(100))),
    );
    let ctx = Context::with_timeout(ms(1_000));
    let start = Instant::now();

    let got = race::get(&ctx, &fetcher, &["a", "b", "c"], KEY).await;

    assert_eq!(got.ok().as_deref(), Some("c"));
    assert!(start.elapsed() < ms(200));
}

#[tokio::test]
async fn caller_cancel_stops_the_race() {
    let fetcher = Arc::new(MemoryFetcher::new().respond(
        "addr1",
        KEY,
        Response::value("value1").after(Duration::from_secs(30)),
    ));
    let ctx = Context::background();

    let canceler = ctx.clone();
    tokio::spawn(async move {
        time::sleep(ms(20)).await;
        canceler.cancel();
    });

    let err = time::timeout(
        Duration::from_secs(5),
        race::get(&ctx, &fetcher, &["addr1"], KEY),
    )
    .await
    .expect("race returns once the caller cancels")
    .unwrap_err();

    assert_eq!(err.context_error(), Some(ContextError::Canceled));
}

#[tokio::test]
async fn already_canceled_context_dispatches_nothing() {
    let fetcher = Arc::new(MemoryFetcher::new().value("addr1", KEY, "value1"));
    let ctx = Context::background();
    ctx.cancel();

    let err = race::get(&ctx, &fetcher, &["addr1"], KEY)
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(fetcher.calls("addr1"), 0);
}

/// Answers immediately from `winner`; every other address waits until its
/// context is done and reports that it gave up.
struct Lingering {
    winner: &'static str,
    gave_up: mpsc::UnboundedSender<String>,
}

impl Fetcher for Lingering {
    type Value = u64;

    async fn fetch(&self, ctx: &Context, address: &str, _key: &str) -> Result<u64, FetchError> {
        if address == "boom" {
            panic!("fetcher bug");
        }
        if address == self.winner {
            return Ok(42);
        }

        match ctx.run(time::sleep(Duration::from_secs(60))).await {
            Ok(()) => Ok(0),
            Err(err) => {
                let _ = self.gave_up.send(address.to_owned());
                Err(err.into())
            }
        }
    }
}

#[tokio::test]
async fn losers_observe_cancellation_after_a_win() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let fetcher = Arc::new(Lingering {
        winner: "fast",
        gave_up: tx,
    });
    let ctx = Context::background();

    let got = race::get(&ctx, &fetcher, &["slow-1", "fast", "slow-2"], KEY).await;
    assert_eq!(got.ok(), Some(42));

    let mut losers = Vec::new();
    for _ in 0..2 {
        let loser = time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("loser gives up promptly")
            .expect("fetcher still alive");
        losers.push(loser);
    }
    losers.sort_unstable();
    assert_eq!(losers, ["slow-1", "slow-2"]);

    // The caller's own context is untouched by the race.
    assert!(!ctx.is_done());
}

#[tokio::test]
async fn panicking_attempt_counts_as_failure() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let fetcher = Arc::new(Lingering {
        winner: "fast",
        gave_up: tx,
    });
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let got = race::get(&ctx, &fetcher, &["boom", "fast"], KEY).await;
    assert_eq!(got.ok(), Some(42));

    let err = race::get(&ctx, &fetcher, &["boom"], KEY).await.unwrap_err();
    assert!(matches!(err.failures()[0].error, FetchError::Other(_)));
}

/// Ignores its context: "slow" sleeps for ten seconds no matter what, every
/// other address answers immediately with its own name.
struct Stubborn;

impl Fetcher for Stubborn {
    type Value = String;

    async fn fetch(&self, _ctx: &Context, address: &str, _key: &str) -> Result<String, FetchError> {
        if address == "slow" {
            time::sleep(Duration::from_secs(10)).await;
        }
        Ok(address.to_owned())
    }
}

#[tokio::test]
async fn winner_is_not_held_up_by_a_loser_ignoring_cancellation() {
    let fetcher = Arc::new(Stubborn);
    let ctx = Context::with_timeout(Duration::from_secs(30));
    let start = std::time::Instant::now();

    let got = time::timeout(
        Duration::from_secs(1),
        race::get(&ctx, &fetcher, &["slow", "fast"], KEY),
    )
    .await
    .expect("winner returns without waiting for the loser");

    assert_eq!(got.ok().as_deref(), Some("fast"));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_successes_yield_one_value() {
    let fetcher = Arc::new(Stubborn);
    let addresses: Vec<String> = (0..16).map(|i| format!("replica-{i}")).collect();

    for _ in 0..50 {
        let ctx = Context::with_timeout(Duration::from_secs(5));
        let value = race::get(&ctx, &fetcher, &addresses, KEY)
            .await
            .expect("every replica answers");

        assert!(addresses.contains(&value), "unexpected winner {value}");
    }
}
