use std::time::Duration;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

const SECS_PER_DAY: i64 = 86_400;

/// A daily trading window in UTC wall-clock time.
///
/// `end` before `start` means the window wraps past midnight
/// (`22:00`-`06:00`). `start == end` is a 24-hour window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub end: NaiveTime,
}

impl Session {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: None,
            start,
            end,
        }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    /// Time from `t` until this window next opens. Zero when already open.
    pub fn until_open(&self, t: NaiveTime) -> Duration {
        if self.contains(t) {
            return Duration::ZERO;
        }
        let now = t.num_seconds_from_midnight() as i64;
        let start = self.start.num_seconds_from_midnight() as i64;
        let wait = (start - now).rem_euclid(SECS_PER_DAY);
        Duration::from_secs(wait as u64)
    }
}

/// The set of windows a strategy may trade in. No windows means the market
/// is always open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sessions {
    sessions: Vec<Session>,
}

impl Sessions {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }

    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        self.sessions.is_empty() || self.sessions.iter().any(|s| s.contains(at.time()))
    }

    /// Time until the nearest window opens. Zero when one is open now.
    pub fn until_open(&self, at: DateTime<Utc>) -> Duration {
        self.sessions
            .iter()
            .map(|s| s.until_open(at.time()))
            .min()
            .unwrap_or(Duration::ZERO)
    }

    /// Sleep until a window is open. Returns `false` if cancelled first.
    pub async fn wait_until_open(&self, cancel: &CancellationToken) -> bool {
        self.wait_until_open_with(cancel, Utc::now).await
    }

    /// [`Sessions::wait_until_open`] reading the time from `now`.
    pub async fn wait_until_open_with<F>(&self, cancel: &CancellationToken, now: F) -> bool
    where
        F: Fn() -> DateTime<Utc>,
    {
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let wait = self.until_open(now());
            if wait.is_zero() {
                return true;
            }
            info!(wait_secs = wait.as_secs(), "Outside trading session, waiting");
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

fn de_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
        .map_err(|e| serde::de::Error::custom(format!("invalid session time '{raw}': {e}")))
}
