//! Node error-message classification.
//!
//! Nodes report estimation failures as free-form strings with no stable
//! error codes, so every pattern the engine relies on lives here. Update
//! this module, not the pipeline, when node messages drift.

use regex_lite::Regex;
use std::sync::OnceLock;

/// What a failed `eth_estimateGas` message tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationFailureKind {
    /// The sender cannot cover the transferred value.
    InsufficientFundsForTransfer,
    /// The sender cannot cover the code deposit of a deployment.
    InsufficientFundsForDeploy,
    /// Anything else; the raw message is the only diagnostic.
    Other,
}

fn insufficient_transfer() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("(?i)insufficient funds for transfer").expect("pattern is valid")
    })
}

fn insufficient_deploy() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("(?i)contract creation code storage out of gas").expect("pattern is valid")
    })
}

/// Classify a gas-estimation failure message.
pub fn classify_estimation_failure(message: &str) -> EstimationFailureKind {
    if insufficient_transfer().is_match(message) {
        EstimationFailureKind::InsufficientFundsForTransfer
    } else if insufficient_deploy().is_match(message) {
        EstimationFailureKind::InsufficientFundsForDeploy
    } else {
        EstimationFailureKind::Other
    }
}
