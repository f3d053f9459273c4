//! Interactive TUI dashboard for watching replica races.
//!
//! This binary races lookups across a set of simulated replicas with
//! configurable latency and failure rates. Features include:
//! - Live per-address wins, latency and error counts
//! - Race and single-address modes
//! - Batch runs
//! - Session analytics and latency trends

mod app;
mod env;
mod runner;
mod sim;
mod ui;

use std::time::Duration;

use app::{Action, App, AppEvent};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyEventKind};
use env::{build_client, settings_from_env};
use runner::spawn_race_call;
use tokio::sync::mpsc;
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let settings = settings_from_env()?;
    let client = build_client(&settings);
    let mut app = App::new(client, settings);

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app).await;

    ratatui::restore();

    result
}

async fn run_app(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    app.refresh_stats();

    loop {
        while let Ok(AppEvent::RaceFinished(outcome)) = rx.try_recv() {
            app.record(outcome);
        }

        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.batch.wants_more() {
            spawn_race_call(app, tx.clone());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key.code) {
            Action::Quit => return Ok(()),
            Action::StartRace => spawn_race_call(app, tx.clone()),
            Action::Continue => {}
        }
    }
}
