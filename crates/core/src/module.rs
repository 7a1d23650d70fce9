//! Planner-facing view of a deployment module.
//!
//! The planner hands the engine a flat list of futures. The engine only
//! cares about two things per future: whether its kind can ever submit a
//! transaction, and which account it would submit from.

use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Kind of a deployment future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FutureKind {
    /// Deploy a contract (creation transaction).
    ContractDeployment,
    /// Call a state-mutating contract function.
    ContractCall,
    /// Transfer value and/or raw data to an address.
    SendData,
    /// Read-only contract call executed from a sender, never a transaction.
    StaticCall,
    /// Attach to an already-deployed contract by name.
    ContractAtByName,
    /// Attach to an already-deployed contract by artifact.
    ContractAtByArtifact,
    /// Read an argument out of an emitted event.
    ReadEventArgument,
    /// ABI-encode a function call without submitting it.
    EncodeFunctionCall,
}

impl FutureKind {
    /// Whether futures of this kind submit transactions and therefore
    /// allocate nonces.
    pub fn produces_onchain_transactions(&self) -> bool {
        matches!(
            self,
            Self::ContractDeployment | Self::ContractCall | Self::SendData
        )
    }

    /// Whether this kind never talks to the chain as a sender at all.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ContractAtByName
                | Self::ContractAtByArtifact
                | Self::ReadEventArgument
                | Self::EncodeFunctionCall
        )
    }
}

/// Where a future's transactions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SenderSpec {
    /// Use the deployment's default sender.
    Default,
    /// Index into the configured account list.
    Account(usize),
    /// An explicit address.
    Explicit(Address),
}

/// One future of the module plan, as seen by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedFuture {
    /// Future id, unique within the plan.
    pub id: String,
    pub kind: FutureKind,
    pub from: SenderSpec,
}

impl PlannedFuture {
    pub fn new(id: impl Into<String>, kind: FutureKind, from: SenderSpec) -> Self {
        Self {
            id: id.into(),
            kind,
            from,
        }
    }

    /// Resolve the concrete sender this future would transact from.
    ///
    /// Read-only kinds resolve to `None`; they never allocate nonces, so
    /// the sync engine must not account for them.
    pub fn resolve_sender(
        &self,
        accounts: &[Address],
        default_sender: Address,
    ) -> Result<Option<Address>> {
        if self.kind.is_read_only() {
            return Ok(None);
        }
        let sender = match self.from {
            SenderSpec::Default => default_sender,
            SenderSpec::Explicit(address) => address,
            SenderSpec::Account(index) => *accounts.get(index).ok_or_else(|| {
                anyhow!(
                    "future '{}' references account #{index} but only {} accounts are configured",
                    self.id,
                    accounts.len()
                )
            })?,
        };
        Ok(Some(sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const DEFAULT: Address = address!("1111111111111111111111111111111111111111");
    const ACCOUNT: Address = address!("2222222222222222222222222222222222222222");

    #[test]
    fn test_sender_resolution() {
        let accounts = vec![DEFAULT, ACCOUNT];

        let explicit = PlannedFuture::new(
            "m#explicit",
            FutureKind::ContractCall,
            SenderSpec::Explicit(ACCOUNT),
        );
        assert_eq!(
            explicit.resolve_sender(&accounts, DEFAULT).unwrap(),
            Some(ACCOUNT)
        );

        let by_index =
            PlannedFuture::new("m#indexed", FutureKind::SendData, SenderSpec::Account(1));
        assert_eq!(
            by_index.resolve_sender(&accounts, DEFAULT).unwrap(),
            Some(ACCOUNT)
        );

        let defaulted = PlannedFuture::new(
            "m#defaulted",
            FutureKind::ContractDeployment,
            SenderSpec::Default,
        );
        assert_eq!(
            defaulted.resolve_sender(&accounts, DEFAULT).unwrap(),
            Some(DEFAULT)
        );
    }

    #[test]
    fn test_read_only_kinds_have_no_sender() {
        for kind in [
            FutureKind::ContractAtByName,
            FutureKind::ContractAtByArtifact,
            FutureKind::ReadEventArgument,
            FutureKind::EncodeFunctionCall,
        ] {
            let future = PlannedFuture::new("m#ro", kind, SenderSpec::Explicit(ACCOUNT));
            assert_eq!(future.resolve_sender(&[], DEFAULT).unwrap(), None);
        }
    }

    #[test]
    fn test_static_call_resolves_a_sender_but_produces_no_transactions() {
        let future = PlannedFuture::new("m#static", FutureKind::StaticCall, SenderSpec::Default);
        assert_eq!(
            future.resolve_sender(&[], DEFAULT).unwrap(),
            Some(DEFAULT)
        );
        assert!(!FutureKind::StaticCall.produces_onchain_transactions());
    }

    #[test]
    fn test_out_of_range_account_index() {
        let future = PlannedFuture::new("m#oob", FutureKind::ContractCall, SenderSpec::Account(3));
        assert!(future.resolve_sender(&[DEFAULT], DEFAULT).is_err());
    }
}
