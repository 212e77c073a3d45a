//! Staking event sources.
//!
//! An [`EventSource`] yields the raw stake/unstake records for a contract.
//! Two are provided: a demonstration data set generated relative to the
//! clock, and a JSON file of previously exported events for offline analysis.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};

use crate::clock::Clock;
use crate::staking::StakingEvent;

/// Simulated latency of the demonstration source
pub const DEFAULT_MOCK_LATENCY_MS: u64 = 2000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch every staking event recorded for `contract`, in no particular order.
    async fn fetch_staking_events(&self, contract: &str) -> Result<Vec<StakingEvent>>;

    /// Short label for logs and health output.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Demonstration source
// ---------------------------------------------------------------------------

/// Fixed demonstration events, timed relative to the clock at fetch time.
///
/// The contract address is ignored: every contract gets the same stakers.
pub struct MockEventSource {
    clock: Arc<dyn Clock>,
    latency: Duration,
}

impl MockEventSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            latency: Duration::from_millis(DEFAULT_MOCK_LATENCY_MS),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The demonstration events as of `now_ms`.
    pub fn events_at(now_ms: i64) -> Vec<StakingEvent> {
        // (staker, token, started days ago, ended days ago)
        const ROWS: [(&str, &str, i64, Option<i64>); 8] = [
            ("ronin:abc123def456abc123def456abc123def456abcd", "1001", 90, Some(10)),
            ("ronin:abc123def456abc123def456abc123def456abcd", "1002", 120, None),
            ("ronin:5678abcd5678abcd5678abcd5678abcd5678abcd", "1003", 60, Some(30)),
            ("ronin:5678abcd5678abcd5678abcd5678abcd5678abcd", "1004", 45, None),
            ("ronin:5678abcd5678abcd5678abcd5678abcd5678abcd", "1005", 30, None),
            ("ronin:9012efgh9012efgh9012efgh9012efgh9012efgh", "1006", 180, Some(90)),
            ("ronin:3456ijkl3456ijkl3456ijkl3456ijkl3456ijkl", "1007", 200, None),
            ("ronin:7890mnop7890mnop7890mnop7890mnop7890mnop", "1008", 150, Some(120)),
        ];

        ROWS.iter()
            .map(|&(staker, token, started, ended)| StakingEvent {
                staker: staker.to_string(),
                token_id: token.to_string(),
                staking_start_time: now_ms - started * DAY_MS,
                staking_end_time: ended.map(|days| now_ms - days * DAY_MS),
            })
            .collect()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_staking_events(&self, contract: &str) -> Result<Vec<StakingEvent>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let events = Self::events_at(self.clock.now_ms());
        tracing::debug!(%contract, count = events.len(), "generated demonstration events");
        Ok(events)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Reads a JSON array of [`StakingEvent`] records on every fetch.
///
/// The file is treated as the export for whichever contract is requested.
pub struct FileEventSource {
    path: PathBuf,
}

impl FileEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn fetch_staking_events(&self, contract: &str) -> Result<Vec<StakingEvent>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .wrap_err_with(|| format!("Failed to read events file: {}", self.path.display()))?;
        let events: Vec<StakingEvent> = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse events file: {}", self.path.display()))?;
        tracing::debug!(%contract, path = %self.path.display(), count = events.len(), "loaded events file");
        Ok(events)
    }

    fn name(&self) -> &str {
        "file"
    }
}
