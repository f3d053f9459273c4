//! An in-memory [`Fetcher`] with scripted answers.
//!
//! Each `(address, key)` pair can answer with a value or an error, optionally
//! after a delay. Pairs that were never scripted answer "key not found". Delays
//! honor the attempt's context, so abandoned attempts stop waiting.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::{context::Context, errors::FetchError, fetch::Fetcher};

/// A scripted answer for one `(address, key)` pair.
#[derive(Debug, Clone)]
pub struct Response {
    outcome: Result<String, String>,
    delay: Duration,
}

impl Response {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            outcome: Ok(value.into()),
            delay: Duration::ZERO,
        }
    }

    /// Answers as an unreachable address with the given reason.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            delay: Duration::ZERO,
        }
    }

    /// Delays the answer by `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: HashMap<String, HashMap<String, Response>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts `response` for `key` at `address`, replacing any earlier one.
    pub fn respond(
        mut self,
        address: impl Into<String>,
        key: impl Into<String>,
        response: Response,
    ) -> Self {
        self.responses
            .entry(address.into())
            .or_default()
            .insert(key.into(), response);
        self
    }

    /// Shorthand for an immediate value.
    pub fn value(
        self,
        address: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.respond(address, key, Response::value(value))
    }

    /// Shorthand for an immediate error.
    pub fn error(
        self,
        address: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.respond(address, key, Response::error(reason))
    }

    /// Registers `address` with no keys, so every lookup is "not found".
    pub fn empty(mut self, address: impl Into<String>) -> Self {
        self.responses.entry(address.into()).or_default();
        self
    }

    /// Number of fetches issued against `address`.
    pub fn calls(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    fn record_call(&self, address: &str) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        *calls.entry(address.to_owned()).or_insert(0) += 1;
    }
}

impl Fetcher for MemoryFetcher {
    type Value = String;

    async fn fetch(&self, ctx: &Context, address: &str, key: &str) -> Result<String, FetchError> {
        self.record_call(address);

        let Some(response) = self.responses.get(address).and_then(|keys| keys.get(key)) else {
            return Err(FetchError::NotFound {
                key: key.to_owned(),
            });
        };

        if !response.delay.is_zero() {
            ctx.run(tokio::time::sleep(response.delay)).await?;
        }

        match &response.outcome {
            Ok(value) => Ok(value.clone()),
            Err(reason) => Err(FetchError::Unreachable {
                address: address.to_owned(),
                reason: reason.clone(),
            }),
        }
    }
}
