//! stakescope: NFT staking analytics
//!
//! Pulls staking lifecycle events for a contract, aggregates them into
//! per-staker statistics and contract-wide totals, and keeps the result in a
//! short-lived read-through cache.
//!
//! # Reported figures
//!
//! - **uniqueStakers**: one row per staker, most NFTs first
//! - **nftsStaked**: distinct token ids per staker
//! - **totalDurationInDays**: summed staking time across a staker's events
//! - **averageStakingDuration**: mean of the per-staker totals

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod server;
pub mod source;
pub mod staking;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{StakingCache, DEFAULT_TTL_MS};
use crate::clock::Clock;
use crate::error::AnalyticsError;
use crate::policy::NegativeDurationPolicy;
use crate::source::{EventSource, FileEventSource, MockEventSource};
use crate::staking::{aggregate, ProcessedStakingData};

// ---------------------------------------------------------------------------
// Event source selection
// ---------------------------------------------------------------------------

/// Pick the event source: an exported events file if given, otherwise the
/// demonstration data with the given simulated latency.
pub fn event_source(
    events_file: Option<PathBuf>,
    mock_latency: Duration,
    clock: Arc<dyn Clock>,
) -> Arc<dyn EventSource> {
    match events_file {
        Some(path) => Arc::new(FileEventSource::new(path)),
        None => Arc::new(MockEventSource::new(clock).with_latency(mock_latency)),
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Event source, aggregation and cache behind one entry point.
pub struct StakingAnalyzer {
    source: Arc<dyn EventSource>,
    cache: StakingCache,
    clock: Arc<dyn Clock>,
    policy: NegativeDurationPolicy,
}

impl StakingAnalyzer {
    /// Create an analyzer with the default 5 minute cache TTL.
    pub fn new(source: Arc<dyn EventSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: StakingCache::with_ttl_ms(DEFAULT_TTL_MS, Arc::clone(&clock)),
            clock,
            policy: NegativeDurationPolicy::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = StakingCache::new(ttl, Arc::clone(&self.clock));
        self
    }

    pub fn with_policy(mut self, policy: NegativeDurationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(&self) -> &StakingCache {
        &self.cache
    }

    pub fn policy(&self) -> NegativeDurationPolicy {
        self.policy
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Staking analytics for `contract`, served from cache while fresh.
    pub async fn get_staking_data(
        &self,
        contract: &str,
    ) -> Result<ProcessedStakingData, AnalyticsError> {
        validate_contract(contract)?;
        self.cache
            .get_or_refresh(contract, || self.fetch_and_aggregate(contract))
            .await
    }

    /// Fetch and aggregate without consulting or filling the cache.
    pub async fn analyze_contract(
        &self,
        contract: &str,
    ) -> Result<ProcessedStakingData, AnalyticsError> {
        validate_contract(contract)?;
        self.fetch_and_aggregate(contract).await
    }

    async fn fetch_and_aggregate(
        &self,
        contract: &str,
    ) -> Result<ProcessedStakingData, AnalyticsError> {
        let start = Instant::now();
        let source_name = self.source.name();

        let fetched = self.source.fetch_staking_events(contract).await;
        let fetch_ms = start.elapsed().as_millis() as u64;
        crate::metrics::record_source_call(source_name, fetched.is_ok(), fetch_ms);

        let events = fetched.map_err(|source| {
            tracing::warn!(%contract, source = source_name, error = %source, "event source failed");
            crate::metrics::record_error("source_failure");
            AnalyticsError::SourceFailure {
                contract: contract.to_string(),
                source,
            }
        })?;

        let malformed = events.iter().filter(|e| e.is_malformed()).count();
        if malformed > 0 {
            tracing::warn!(
                %contract,
                malformed,
                policy = %self.policy,
                "events end before they start"
            );
        }

        let data = aggregate(&events, self.clock.now_ms(), self.policy);
        let processing_time_ms = start.elapsed().as_millis() as u64;
        crate::metrics::record_analysis(
            data.total_unique_stakers,
            data.total_nfts_staked,
            processing_time_ms,
        );
        tracing::info!(
            %contract,
            events = events.len(),
            stakers = data.total_unique_stakers,
            nfts = data.total_nfts_staked,
            processing_time_ms,
            "analysis complete"
        );
        Ok(data)
    }
}

fn validate_contract(contract: &str) -> Result<(), AnalyticsError> {
    if contract.trim().is_empty() {
        crate::metrics::record_error("invalid_input");
        return Err(AnalyticsError::InvalidInput);
    }
    Ok(())
}
