//! Dashboard state: what is selected, what ran, and how the session is going.

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use crossterm::event::KeyCode;
use race_get::{AddressStatsSnapshot, RaceClient};

use crate::{env::Settings, sim::SimulatedFetcher};

const HISTORY_LEN: usize = 100;
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// How a race picks its addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Race the first `racing` addresses.
    Race,
    /// Query only the selected address.
    SingleAddress,
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    StartRace,
    Quit,
}

/// How one race ended.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub winner: Option<String>,
    pub latency_ms: f64,
    pub ok: bool,
    pub message: String,
}

/// Sent by background races back to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    RaceFinished(Outcome),
}

/// Totals for everything raced since the dashboard started.
#[derive(Debug)]
pub struct Session {
    started: Instant,
    pub races: u64,
    pub won: u64,
    pub failed: u64,
    recent: VecDeque<Instant>,
    latencies: HashMap<String, VecDeque<u64>>,
}

impl Session {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            races: 0,
            won: 0,
            failed: 0,
            recent: VecDeque::new(),
            latencies: HashMap::new(),
        }
    }

    fn record(&mut self, outcome: &Outcome) {
        self.races += 1;
        if outcome.ok {
            self.won += 1;
        } else {
            self.failed += 1;
        }

        if let Some(winner) = &outcome.winner {
            let history = self.latencies.entry(winner.clone()).or_default();
            if history.len() == HISTORY_LEN {
                history.pop_front();
            }
            history.push_back(outcome.latency_ms as u64);
        }

        let now = Instant::now();
        self.recent.push_back(now);
        while self
            .recent
            .front()
            .is_some_and(|&t| now.duration_since(t) > RATE_WINDOW)
        {
            self.recent.pop_front();
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Share of races that produced a value, in percent.
    pub fn success_rate(&self) -> f64 {
        match self.races {
            0 => 0.0,
            n => self.won as f64 * 100.0 / n as f64,
        }
    }

    pub fn races_per_second(&self) -> f64 {
        let now = Instant::now();
        self.recent
            .iter()
            .filter(|&&t| now.duration_since(t) <= RATE_WINDOW)
            .count() as f64
    }

    /// Mean winning latency over every address' history.
    pub fn average_latency(&self) -> f64 {
        let samples: Vec<u64> = self.latencies.values().flatten().copied().collect();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<u64>() as f64 / samples.len() as f64
    }

    /// Winning latencies of `address`, oldest first.
    pub fn history(&self, address: &str) -> Vec<u64> {
        self.latencies
            .get(address)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// A run of back-to-back races.
#[derive(Debug, Clone, Copy)]
pub struct Batch {
    pub size: usize,
    pub done: usize,
    pub running: bool,
}

impl Batch {
    const STEP: usize = 10;
    const MAX: usize = 1000;

    pub fn wants_more(&self) -> bool {
        self.running && self.done < self.size
    }

    pub fn percent(&self) -> u16 {
        (self.done * 100 / self.size.max(1)).min(100) as u16
    }

    fn resize(&mut self, grow: bool) {
        self.size = if grow {
            (self.size + Self::STEP).min(Self::MAX)
        } else {
            self.size.saturating_sub(Self::STEP).max(Self::STEP)
        };
    }

    /// Counts one finished race; returns true when that completed the batch.
    fn advance(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.done += 1;
        self.running = self.done < self.size;
        !self.running
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            size: Self::STEP,
            done: 0,
            running: false,
        }
    }
}

pub struct App {
    pub client: RaceClient<SimulatedFetcher>,
    pub addresses: Vec<String>,
    pub key: String,
    pub timeout: Duration,
    pub selected: usize,
    pub mode: Mode,
    /// How many addresses a race in [`Mode::Race`] uses.
    pub racing: usize,
    pub status: String,
    pub last: Option<Outcome>,
    pub stats: HashMap<String, AddressStatsSnapshot>,
    pub session: Session,
    pub batch: Batch,
}

impl App {
    pub fn new(client: RaceClient<SimulatedFetcher>, settings: Settings) -> Self {
        let addresses: Vec<String> = settings.replicas.into_iter().map(|r| r.address).collect();

        Self {
            client,
            racing: addresses.len(),
            addresses,
            key: settings.key,
            timeout: settings.timeout,
            selected: 0,
            mode: Mode::Race,
            status: "Ready. 'r' races, 'b' starts a batch".to_string(),
            last: None,
            stats: HashMap::new(),
            session: Session::new(),
            batch: Batch::default(),
        }
    }

    /// Moves the selection by `step`, wrapping at either end.
    fn move_selection(&mut self, step: isize) {
        let len = self.addresses.len() as isize;
        if len > 0 {
            self.selected = (self.selected as isize + step).rem_euclid(len) as usize;
        }
    }

    fn set_racing(&mut self, racing: usize) {
        self.racing = racing.clamp(1, self.addresses.len().max(1));
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char('r') => return Action::StartRace,
            KeyCode::Char(' ') => {
                self.mode = Mode::SingleAddress;
                return Action::StartRace;
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Tab => {
                self.mode = match self.mode {
                    Mode::Race => Mode::SingleAddress,
                    Mode::SingleAddress => Mode::Race,
                }
            }
            KeyCode::Char('b') => self.toggle_batch(),
            KeyCode::Char('+' | '=') => self.set_racing(self.racing + 1),
            KeyCode::Char('-' | '_') => self.set_racing(self.racing.saturating_sub(1)),
            KeyCode::Char('[' | ',') => self.batch.resize(false),
            KeyCode::Char(']' | '.') => self.batch.resize(true),
            KeyCode::Char('s') => {
                self.client.reset_stats();
                self.stats.clear();
                self.status = "Stats reset".to_string();
            }
            _ => {}
        }
        Action::Continue
    }

    fn toggle_batch(&mut self) {
        self.batch.running = !self.batch.running;
        self.status = if self.batch.running {
            self.batch.done = 0;
            format!("Batch of {} races started", self.batch.size)
        } else {
            "Batch stopped".to_string()
        };
    }

    /// Addresses the next race will use.
    pub fn active_addresses(&self) -> Vec<String> {
        match self.mode {
            Mode::Race => self.addresses[..self.racing.min(self.addresses.len())].to_vec(),
            Mode::SingleAddress => self
                .selected_address()
                .map(str::to_string)
                .into_iter()
                .collect(),
        }
    }

    pub fn selected_address(&self) -> Option<&str> {
        self.addresses.get(self.selected).map(String::as_str)
    }

    pub fn refresh_stats(&mut self) {
        self.stats = self.client.address_stats();
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.refresh_stats();
        self.session.record(&outcome);

        let mark = if outcome.ok { "✓" } else { "✗" };
        self.status = format!("{mark} {} ({:.0} ms)", outcome.message, outcome.latency_ms);
        if self.batch.advance() {
            self.status = format!("Batch done: {} races", self.batch.size);
        }
        self.last = Some(outcome);
    }

    pub fn mode_label(&self) -> String {
        match self.mode {
            Mode::Race => format!("Race ({} addresses)", self.racing),
            Mode::SingleAddress => "Single Address".to_string(),
        }
    }
}
