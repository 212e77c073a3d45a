//! Handling of malformed staking events whose end precedes their start.
//!
//! Three policies: PassThrough, Clamp, Reject.
//! - PassThrough: negative durations are summed as-is
//! - Clamp: the duration counts as zero days, the token still counts
//! - Reject: the event is dropped from aggregation entirely

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegativeDurationPolicy {
    #[default]
    PassThrough,
    Clamp,
    Reject,
}

impl NegativeDurationPolicy {
    /// Apply the policy to an event duration in days.
    ///
    /// Returns `None` when the event must be skipped.
    pub fn apply(&self, days: f64) -> Option<f64> {
        if days >= 0.0 {
            return Some(days);
        }
        match self {
            Self::PassThrough => Some(days),
            Self::Clamp => Some(0.0),
            Self::Reject => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::Clamp => "clamp",
            Self::Reject => "reject",
        }
    }
}

impl std::str::FromStr for NegativeDurationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass-through" | "passthrough" => Ok(Self::PassThrough),
            "clamp" => Ok(Self::Clamp),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown negative duration policy '{other}', expected pass-through/clamp/reject"
            )),
        }
    }
}

impl std::fmt::Display for NegativeDurationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_negative_untouched() {
        for policy in [
            NegativeDurationPolicy::PassThrough,
            NegativeDurationPolicy::Clamp,
            NegativeDurationPolicy::Reject,
        ] {
            assert_eq!(policy.apply(3.5), Some(3.5));
            assert_eq!(policy.apply(0.0), Some(0.0));
        }
    }

    #[test]
    fn test_negative_handling() {
        assert_eq!(NegativeDurationPolicy::PassThrough.apply(-2.0), Some(-2.0));
        assert_eq!(NegativeDurationPolicy::Clamp.apply(-2.0), Some(0.0));
        assert_eq!(NegativeDurationPolicy::Reject.apply(-2.0), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "Pass-Through".parse::<NegativeDurationPolicy>().unwrap(),
            NegativeDurationPolicy::PassThrough
        );
        assert_eq!(
            "clamp".parse::<NegativeDurationPolicy>().unwrap(),
            NegativeDurationPolicy::Clamp
        );
        assert_eq!(
            "REJECT".parse::<NegativeDurationPolicy>().unwrap(),
            NegativeDurationPolicy::Reject
        );
        assert!("drop".parse::<NegativeDurationPolicy>().is_err());
    }

    #[test]
    fn test_default_and_toml_value() {
        assert_eq!(
            NegativeDurationPolicy::default(),
            NegativeDurationPolicy::PassThrough
        );
        #[derive(Deserialize)]
        struct Wrapper {
            policy: NegativeDurationPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"clamp\"").unwrap();
        assert_eq!(w.policy, NegativeDurationPolicy::Clamp);
    }
}
