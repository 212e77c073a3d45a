//! Errors surfaced by the staking analyzer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The caller supplied no contract address.
    #[error("a contract address is required")]
    InvalidInput,

    /// The event source could not deliver events for the contract.
    #[error("failed to fetch staking events for {contract}")]
    SourceFailure {
        contract: String,
        #[source]
        source: eyre::Report,
    },
}

impl AnalyticsError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::SourceFailure { .. } => "source_failure",
        }
    }
}
