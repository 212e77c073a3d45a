//! Core data types for NFT staking analytics.
//!
//! Defines staking lifecycle events, per-staker summaries, the contract-wide
//! result, and the aggregation pipeline that turns the former into the latter.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::policy::NegativeDurationPolicy;

/// Milliseconds in one day.
pub const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

// ---------------------------------------------------------------------------
// Event data types
// ---------------------------------------------------------------------------

/// A single stake (and optional unstake) occurrence observed for a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingEvent {
    pub staker: String,
    pub token_id: String,
    /// Milliseconds since epoch
    pub staking_start_time: i64,
    /// Milliseconds since epoch; `None` while the token is still staked
    #[serde(default)]
    pub staking_end_time: Option<i64>,
}

impl StakingEvent {
    /// End of the staking interval, or `now_ms` if the token is still staked.
    ///
    /// An end time of zero counts as "still staked".
    pub fn effective_end(&self, now_ms: i64) -> i64 {
        match self.staking_end_time {
            Some(end) if end != 0 => end,
            _ => now_ms,
        }
    }

    /// Unrounded staking duration in days. Negative if the event ends before it starts.
    ///
    /// Computed in floating point so any pair of timestamps yields a value.
    pub fn duration_days(&self, now_ms: i64) -> f64 {
        (self.effective_end(now_ms) as f64 - self.staking_start_time as f64) / MS_PER_DAY
    }

    /// Whether the event closes before it opened.
    pub fn is_malformed(&self) -> bool {
        matches!(self.staking_end_time, Some(end) if end != 0 && end < self.staking_start_time)
    }
}

// ---------------------------------------------------------------------------
// Derived data types
// ---------------------------------------------------------------------------

/// Per-staker statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakerSummary {
    pub address: String,
    /// Distinct token ids attributed to this staker
    pub nfts_staked: u64,
    /// Sum of all event durations, rounded to whole days (not an average)
    pub total_duration_in_days: i64,
}

/// Contract-wide staking analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedStakingData {
    /// Sorted descending by `nfts_staked`, ties in first-seen order
    pub unique_stakers: Vec<StakerSummary>,
    pub total_unique_stakers: u64,
    pub total_nfts_staked: u64,
    pub average_staking_duration: i64,
}

impl ProcessedStakingData {
    pub fn empty() -> Self {
        Self {
            unique_stakers: Vec::new(),
            total_unique_stakers: 0,
            total_nfts_staked: 0,
            average_staking_duration: 0,
        }
    }

    /// The staker holding the most distinct NFTs, if any.
    pub fn top_staker(&self) -> Option<&StakerSummary> {
        self.unique_stakers.first()
    }

    /// NFT counts bucketed by each staker's total staking days.
    ///
    /// Upper bounds are inclusive; negative totals land in the first bucket.
    pub fn duration_distribution(&self) -> [(&'static str, u64); 5] {
        let mut buckets = [
            ("0-30 days", 0),
            ("31-90 days", 0),
            ("91-180 days", 0),
            ("181-365 days", 0),
            ("365+ days", 0),
        ];
        for staker in &self.unique_stakers {
            let i = match staker.total_duration_in_days {
                d if d <= 30 => 0,
                d if d <= 90 => 1,
                d if d <= 180 => 2,
                d if d <= 365 => 3,
                _ => 4,
            };
            buckets[i].1 += staker.nfts_staked;
        }
        buckets
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

struct StakerTally<'a> {
    address: &'a str,
    tokens: HashSet<&'a str>,
    duration_days: f64,
}

/// Aggregate staking events into per-staker summaries and contract totals.
///
/// `now_ms` closes every still-open event. Grouping keeps the order in which
/// stakers first appear, so the descending sort on NFT count is stable
/// against input order.
pub fn aggregate(
    events: &[StakingEvent],
    now_ms: i64,
    policy: NegativeDurationPolicy,
) -> ProcessedStakingData {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<StakerTally<'_>> = Vec::new();

    for event in events {
        let days = event.duration_days(now_ms);
        // Open events starting after `now` are clock skew, not malformed.
        let days = if event.is_malformed() {
            match policy.apply(days) {
                Some(days) => days,
                None => continue,
            }
        } else {
            days
        };

        let slot = *index.entry(event.staker.as_str()).or_insert_with(|| {
            tallies.push(StakerTally {
                address: event.staker.as_str(),
                tokens: HashSet::new(),
                duration_days: 0.0,
            });
            tallies.len() - 1
        });

        let tally = &mut tallies[slot];
        tally.tokens.insert(event.token_id.as_str());
        tally.duration_days += days;
    }

    let mut unique_stakers: Vec<StakerSummary> = tallies
        .into_iter()
        .map(|tally| StakerSummary {
            address: tally.address.to_string(),
            nfts_staked: tally.tokens.len() as u64,
            total_duration_in_days: round_half_up(tally.duration_days),
        })
        .collect();

    // sort_by is stable
    unique_stakers.sort_by(|a, b| b.nfts_staked.cmp(&a.nfts_staked));

    let total_unique_stakers = unique_stakers.len() as u64;
    let total_nfts_staked = unique_stakers.iter().map(|s| s.nfts_staked).sum();
    let total_duration: f64 = unique_stakers
        .iter()
        .map(|s| s.total_duration_in_days as f64)
        .sum();
    let average_staking_duration = if total_unique_stakers > 0 {
        round_half_up(total_duration / total_unique_stakers as f64)
    } else {
        0
    };

    ProcessedStakingData {
        unique_stakers,
        total_unique_stakers,
        total_nfts_staked,
        average_staking_duration,
    }
}

/// Round to the nearest integer, halves toward positive infinity.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;
    const DAY: i64 = 86_400_000;

    fn event(staker: &str, token: &str, start: i64, end: Option<i64>) -> StakingEvent {
        StakingEvent {
            staker: staker.to_string(),
            token_id: token.to_string(),
            staking_start_time: start,
            staking_end_time: end,
        }
    }

    #[test]
    fn test_aggregate_empty() {
        let data = aggregate(&[], T, NegativeDurationPolicy::PassThrough);
        assert_eq!(data, ProcessedStakingData::empty());
        assert!(data.top_staker().is_none());
    }

    #[test]
    fn test_aggregate_single_staker_example() {
        let events = vec![
            event("S1", "1", T - 90 * DAY, Some(T - 10 * DAY)),
            event("S1", "2", T - 120 * DAY, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);

        assert_eq!(
            data.unique_stakers,
            vec![StakerSummary {
                address: "S1".to_string(),
                nfts_staked: 2,
                total_duration_in_days: 200,
            }]
        );
        assert_eq!(data.total_unique_stakers, 1);
        assert_eq!(data.total_nfts_staked, 2);
        assert_eq!(data.average_staking_duration, 200);
    }

    #[test]
    fn test_duplicate_tokens_collapse() {
        let events = vec![
            event("A", "7", T - 2 * DAY, Some(T - DAY)),
            event("A", "7", T - 3 * DAY, Some(T - DAY)),
            event("B", "8", T - DAY, None),
            event("B", "9", T - DAY, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);

        assert_eq!(data.unique_stakers[0].address, "B");
        assert_eq!(data.unique_stakers[0].nfts_staked, 2);
        assert_eq!(data.unique_stakers[1].address, "A");
        assert_eq!(data.unique_stakers[1].nfts_staked, 1);
        // both A events still contribute their durations
        assert_eq!(data.unique_stakers[1].total_duration_in_days, 3);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let events = vec![
            event("C", "1", T - DAY, None),
            event("A", "2", T - DAY, None),
            event("B", "3", T - DAY, None),
            event("B", "4", T - DAY, None),
            event("C", "5", T - DAY, None),
            event("A", "6", T - DAY, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        let order: Vec<&str> = data
            .unique_stakers
            .iter()
            .map(|s| s.address.as_str())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_sorted_descending() {
        let events = vec![
            event("one", "1", T - DAY, None),
            event("three", "1", T - DAY, None),
            event("three", "2", T - DAY, None),
            event("three", "3", T - DAY, None),
            event("two", "1", T - DAY, None),
            event("two", "2", T - DAY, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        for pair in data.unique_stakers.windows(2) {
            assert!(pair[0].nfts_staked >= pair[1].nfts_staked);
        }
        assert_eq!(data.total_nfts_staked, 6);
        assert_eq!(data.total_unique_stakers, 3);
    }

    #[test]
    fn test_zero_end_time_counts_as_open() {
        let events = vec![event("S", "1", T - 5 * DAY, Some(0))];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        assert_eq!(data.unique_stakers[0].total_duration_in_days, 5);
        assert!(!events[0].is_malformed());
    }

    #[test]
    fn test_rounding_is_per_staker_then_averaged() {
        // 1.4 + 1.4 days for X -> 3, 0.4 days for Y -> 0; avg (3 + 0) / 2 = 1.5 -> 2
        let d14 = DAY * 14 / 10;
        let d04 = DAY * 4 / 10;
        let events = vec![
            event("X", "1", T - d14, None),
            event("X", "2", T - d14, None),
            event("Y", "3", T - d04, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        assert_eq!(data.unique_stakers[0].total_duration_in_days, 3);
        assert_eq!(data.unique_stakers[1].total_duration_in_days, 0);
        assert_eq!(data.average_staking_duration, 2);
    }

    #[test]
    fn test_negative_duration_pass_through() {
        let events = vec![event("S", "1", T, Some(T - 4 * DAY))];
        assert!(events[0].is_malformed());
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        assert_eq!(data.unique_stakers[0].total_duration_in_days, -4);
        assert_eq!(data.average_staking_duration, -4);
    }

    #[test]
    fn test_negative_duration_clamp() {
        let events = vec![
            event("S", "1", T, Some(T - 4 * DAY)),
            event("S", "2", T - 6 * DAY, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::Clamp);
        assert_eq!(data.unique_stakers[0].nfts_staked, 2);
        assert_eq!(data.unique_stakers[0].total_duration_in_days, 6);
    }

    #[test]
    fn test_negative_duration_reject() {
        let events = vec![
            event("bad", "1", T, Some(T - 4 * DAY)),
            event("S", "1", T, Some(T - 4 * DAY)),
            event("S", "2", T - 6 * DAY, None),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::Reject);
        assert_eq!(data.total_unique_stakers, 1);
        assert_eq!(data.unique_stakers[0].address, "S");
        assert_eq!(data.unique_stakers[0].nfts_staked, 1);
        assert_eq!(data.unique_stakers[0].total_duration_in_days, 6);
    }

    #[test]
    fn test_open_event_with_future_start_is_not_policed() {
        // start two days after `now`, still staked
        let events = vec![event("S", "1", T + 2 * DAY, None)];
        assert!(!events[0].is_malformed());

        for policy in [
            NegativeDurationPolicy::PassThrough,
            NegativeDurationPolicy::Clamp,
            NegativeDurationPolicy::Reject,
        ] {
            let data = aggregate(&events, T, policy);
            assert_eq!(data.total_unique_stakers, 1, "{policy}");
            assert_eq!(data.unique_stakers[0].total_duration_in_days, -2, "{policy}");
        }
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let span_days = (i64::MAX as f64 - i64::MIN as f64) / MS_PER_DAY;
        let events = vec![
            event("wide", "1", i64::MIN, Some(i64::MAX)),
            event("inverted", "2", i64::MAX, Some(i64::MIN)),
            event("open", "3", i64::MIN, None),
        ];
        assert!(events[1].is_malformed());

        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        assert_eq!(data.total_unique_stakers, 3);
        let days: HashMap<&str, i64> = data
            .unique_stakers
            .iter()
            .map(|s| (s.address.as_str(), s.total_duration_in_days))
            .collect();
        assert_eq!(days["wide"], round_half_up(span_days));
        assert_eq!(days["inverted"], round_half_up(-span_days));
        assert!(days["open"] > 0);

        let clamped = aggregate(&events, T, NegativeDurationPolicy::Clamp);
        assert_eq!(clamped.unique_stakers[1].total_duration_in_days, 0);
        let rejected = aggregate(&events, T, NegativeDurationPolicy::Reject);
        assert_eq!(rejected.total_unique_stakers, 2);
    }

    #[test]
    fn test_duration_distribution() {
        let events = vec![
            event("a", "1", T - 30 * DAY, None),
            event("b", "1", T - 31 * DAY, None),
            event("b", "2", T - 31 * DAY, None),
            event("c", "1", T - 400 * DAY, None),
            event("d", "1", T, Some(T - DAY)),
        ];
        let data = aggregate(&events, T, NegativeDurationPolicy::PassThrough);
        let counts: Vec<u64> = data.duration_distribution().iter().map(|b| b.1).collect();
        // d is negative and joins a in the first bucket; b totals 62 days
        assert_eq!(counts, vec![2, 2, 0, 0, 1]);
        assert_eq!(counts.iter().sum::<u64>(), data.total_nfts_staked);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.4999), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"staker":"ronin:ab","tokenId":"1001","stakingStartTime":5,"stakingEndTime":null}"#;
        let parsed: StakingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token_id, "1001");
        assert_eq!(parsed.staking_end_time, None);

        let data = aggregate(&[parsed], 5 + DAY, NegativeDurationPolicy::PassThrough);
        let out = serde_json::to_string(&data).unwrap();
        assert!(out.contains("\"uniqueStakers\""));
        assert!(out.contains("\"nftsStaked\":1"));
        assert!(out.contains("\"totalDurationInDays\":1"));
        assert!(out.contains("\"averageStakingDuration\":1"));
    }
}
