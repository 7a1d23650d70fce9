//! Simulation decoding seam.
//!
//! The strategy layer owns the ABI knowledge needed to turn a raw
//! simulation result into something a user can act on. The pipeline only
//! needs a single question answered: does this result decode to a failure?

use alloy::primitives::Bytes;
use deploykit_chain::RawCallResult;

/// A decoded simulation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationFailure {
    /// Human-readable reason: decoded revert string, custom error name,
    /// or panic code description.
    pub reason: String,
    /// Raw payload the reason was decoded from.
    pub return_data: Bytes,
}

/// Decodes raw simulation results into structured failures.
///
/// `None` means the result does not decode to a known failure and the
/// pipeline may proceed.
pub trait SimulationDecoder: Send + Sync {
    fn decode(&self, result: &RawCallResult) -> Option<SimulationFailure>;
}

/// Baseline decoder for the standard `Error(string)` and `Panic(uint256)`
/// revert shapes. Strategy layers with ABI access layer custom-error
/// decoding on top.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRevertDecoder;

impl SimulationDecoder for StandardRevertDecoder {
    fn decode(&self, result: &RawCallResult) -> Option<SimulationFailure> {
        if !result.reverted {
            return None;
        }
        let reason = alloy::sol_types::decode_revert_reason(&result.return_data)
            .unwrap_or_else(|| "execution reverted".to_string());
        Some(SimulationFailure {
            reason,
            return_data: result.return_data.clone(),
        })
    }
}
