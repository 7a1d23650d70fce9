//! Network fee models and the replacement fee policy.
//!
//! Supports both Legacy and EIP-1559 fee markets. A resend at the same
//! nonce must outbid the previous attempt, so the replacement policy bumps
//! the prior fees by 10% and takes the field-wise maximum against the
//! node's current recommendation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Replacement bump: a resend pays at least 110% of the prior fees.
const BUMP_NUMERATOR: u128 = 110;
const BUMP_DENOMINATOR: u128 = 100;

/// Fee fields attached to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum NetworkFees {
    /// Single-price fee market (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 fee market.
    Eip1559 {
        /// Maximum total fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee (tip) per gas in wei.
        max_priority_fee_per_gas: u128,
    },
}

impl NetworkFees {
    /// Upper bound this fee setting can pay per unit of gas.
    pub fn max_cost_per_gas(&self) -> u128 {
        match self {
            NetworkFees::Legacy { gas_price } => *gas_price,
            NetworkFees::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

impl fmt::Display for NetworkFees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFees::Legacy { gas_price } => write!(f, "gas price {gas_price} wei"),
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => write!(
                f,
                "max fee {max_fee_per_gas} wei, priority fee {max_priority_fee_per_gas} wei"
            ),
        }
    }
}

/// Failures of the replacement fee policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeeError {
    /// The node recommended legacy fees for a sender whose previous
    /// transaction was priced under EIP-1559. Fee-market type must stay
    /// monotone within one deployment; operator intervention is required.
    #[error("node switched from EIP-1559 back to legacy fees mid-deployment")]
    Eip1559Downgrade,
}

fn bump(value: u128) -> u128 {
    value * BUMP_NUMERATOR / BUMP_DENOMINATOR
}

/// Fees for the next send of an interaction.
///
/// Returns `recommended` unchanged when there is no prior attempt.
/// Otherwise the prior fees are bumped by 10% (integer division) and
/// combined field-wise with the recommendation, taking the maximum. A
/// legacy prior is widened into both EIP-1559 fields when the node has
/// moved to the EIP-1559 market; the reverse transition is an error.
pub fn next_fees(
    recommended: NetworkFees,
    previous: Option<&NetworkFees>,
) -> Result<NetworkFees, FeeError> {
    let Some(previous) = previous else {
        return Ok(recommended);
    };

    match (recommended, *previous) {
        (
            NetworkFees::Legacy { gas_price },
            NetworkFees::Legacy {
                gas_price: prev_gas_price,
            },
        ) => Ok(NetworkFees::Legacy {
            gas_price: gas_price.max(bump(prev_gas_price)),
        }),
        (
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            },
            previous,
        ) => {
            let (prev_max_fee, prev_priority_fee) = match previous {
                NetworkFees::Legacy { gas_price } => (gas_price, gas_price),
                NetworkFees::Eip1559 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                } => (max_fee_per_gas, max_priority_fee_per_gas),
            };
            Ok(NetworkFees::Eip1559 {
                max_fee_per_gas: max_fee_per_gas.max(bump(prev_max_fee)),
                max_priority_fee_per_gas: max_priority_fee_per_gas.max(bump(prev_priority_fee)),
            })
        }
        (NetworkFees::Legacy { .. }, NetworkFees::Eip1559 { .. }) => {
            Err(FeeError::Eip1559Downgrade)
        }
    }
}
