//! Race execution for the TUI dashboard.

use std::time::Instant;

use race_get::{Context, RaceError};
use tokio::sync::mpsc;

use crate::app::{App, AppEvent, Outcome};

/// Spawns a race based on the current app configuration.
///
/// The race runs in a background task and reports via the provided channel.
pub fn spawn_race_call(app: &App, tx: mpsc::UnboundedSender<AppEvent>) {
    let client = app.client.clone();
    let addresses = app.active_addresses();
    let key = app.key.clone();
    let timeout = app.timeout;

    tokio::spawn(async move {
        let start = Instant::now();
        let ctx = Context::with_timeout(timeout);

        let result = client.get(&ctx, &addresses, &key).await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let (winner, ok, message) = match result {
            Ok(won) => (won.address, true, format!("value={}", won.value)),
            Err(RaceError::Canceled(err)) => (None, false, format!("timed out: {err}")),
            Err(e) => (None, false, e.to_string()),
        };

        let _ = tx.send(AppEvent::RaceFinished(Outcome {
            winner,
            latency_ms: elapsed_ms,
            ok,
            message,
        }));
    });
}
