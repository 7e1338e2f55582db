//! Canonical per-account state.
//!
//! Every backend version executes against this one struct; the schema is
//! append-only and backends never introduce fields of their own. That is the
//! whole upgrade contract: a bumped backend may add behavior, never storage.

use crate::types::{Address, TxId, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Class of the effective caller, resolved before any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    Owner,
    Oracle,
    Recovery,
    ThirdParty,
    Unrelated,
}

/// Payload of a queued multisig transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Forward {
        destination: Address,
        value: Value,
        data: Vec<u8>,
        throw_on_failed_call: bool,
    },
    Set2fa(bool),
    SetOracle(Address),
    SetUserProxy(Address),
    SetRecoveryContract(Address),
    AddThirdPartyOwner(Address),
    RevokeThirdPartyOwner(Address),
}

/// A queued (destination, value, data) operation awaiting its second
/// confirmation class. Confirmations only grow; `executed` is terminal.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MultisigTx {
    pub destination: Address,
    pub value: Value,
    pub data: Vec<u8>,
    pub action: PendingAction,
    pub submitter: Address,
    pub executed: bool,
    pub confirmations: BTreeSet<Address>,
}

/// Persistent account fields, fixed schema shared by all backend versions.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserState {
    pub owner: Address,
    /// Pending two-phase ownership offer, if any.
    pub pending_owner: Option<Address>,
    pub proxy: Address,
    /// Factory (or manual creator) that constructed the router. Immutable.
    pub issuer: Address,
    /// Backend provider the router resolves its logic through.
    pub backend_provider: Address,
    /// Highest backend version this account has acknowledged; the migration
    /// signal fires when the resolved backend is newer.
    pub active_version: u32,
    pub oracle: Address,
    pub recovery_contract: Address,
    pub use_2fa: bool,
    pub use_cashback: bool,
    pub initialized: bool,
    pub third_party_owners: BTreeSet<Address>,
    pub transactions: BTreeMap<TxId, MultisigTx>,
    pub transaction_count: u64,
}

impl UserState {
    pub fn new(
        owner: Address,
        recovery_contract: Address,
        backend_provider: Address,
        issuer: Address,
    ) -> Self {
        Self {
            owner,
            pending_owner: None,
            proxy: Address::ZERO,
            issuer,
            backend_provider,
            active_version: 0,
            oracle: Address::ZERO,
            recovery_contract,
            use_2fa: false,
            use_cashback: true,
            initialized: false,
            third_party_owners: BTreeSet::new(),
            transactions: BTreeMap::new(),
            transaction_count: 0,
        }
    }

    pub fn classify(&self, caller: Address) -> CallerClass {
        if caller == self.owner {
            CallerClass::Owner
        } else if caller == self.oracle && !self.oracle.is_zero() {
            CallerClass::Oracle
        } else if caller == self.recovery_contract && !self.recovery_contract.is_zero() {
            CallerClass::Recovery
        } else if self.third_party_owners.contains(&caller) {
            CallerClass::ThirdParty
        } else {
            CallerClass::Unrelated
        }
    }

    pub fn is_third_party_owner(&self, addr: Address) -> bool {
        self.third_party_owners.contains(&addr)
    }

    pub fn next_tx_id(&mut self) -> TxId {
        self.transaction_count += 1;
        self.transaction_count
    }

    /// Class-based 2-of-2: one confirmation by the current owner and one by
    /// the current oracle.
    pub fn is_fully_confirmed(&self, id: TxId) -> bool {
        match self.transactions.get(&id) {
            Some(tx) => {
                tx.confirmations.contains(&self.owner) && tx.confirmations.contains(&self.oracle)
            }
            None => false,
        }
    }
}
