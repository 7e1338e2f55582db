//! The two disjoint failure channels of the account system.
//!
//! `Fault` is the structural channel: a fault aborts the whole call and the
//! hub rolls every state write back. `ErrorCode` is the policy channel:
//! authorization denials, duplicate registrations and similar outcomes are
//! reported as plain codes so relayed or batched callers can inspect them
//! without the call failing.

use crate::types::{Address, TxId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural fault. Atomic rollback, surfaced to the caller as a hard error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("zero address not allowed for {0}")]
    ZeroAddress(&'static str),
    #[error("account {0} is not initialized")]
    NotInitialized(Address),
    #[error("account {0} is already initialized")]
    AlreadyInitialized(Address),
    #[error("no account router at {0}")]
    UnknownAccount(Address),
    #[error("{0} is not deployed")]
    NotDeployed(&'static str),
    #[error("no proxy at {0}")]
    UnknownProxy(Address),
    #[error("no backend provider at {0}")]
    UnknownProvider(Address),
    #[error("no backend registered for version {0}")]
    UnknownBackendVersion(u32),
    #[error("unknown multisig transaction {0}")]
    UnknownTransaction(TxId),
    #[error("multisig transaction {0} already executed")]
    AlreadyExecuted(TxId),
    #[error("{1} already confirmed multisig transaction {0}")]
    AlreadyConfirmed(TxId, Address),
    #[error("{0} is not a multisig signer for this account")]
    NotASigner(Address),
    #[error("ownership transfer is forbidden while 2FA is enabled")]
    OwnershipLockedBy2fa,
    #[error("forwarded call to {0} failed")]
    ForwardedCallFailed(Address),
    #[error("recovery of account {0} failed")]
    RecoveryFailed(Address),
    #[error("insufficient balance on {from}: need {need}, have {have}")]
    InsufficientBalance {
        from: Address,
        need: u128,
        have: u128,
    },
    #[error("{writer} has no access to storage namespace '{namespace}'")]
    StorageAccessDenied { writer: Address, namespace: String },
    #[error("storage codec error: {0}")]
    StorageCodec(String),
}

/// Policy outcome code. The numeric namespace is part of the external
/// interface: 0/1/3 are the shared codes, 20000+ roles, 21000+ factory,
/// 30000+ registry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Unauthorized = 0,
    Ok = 1,
    MultisigAdded = 3,

    RolesAlreadyExists = 20_001,
    RolesInvalidInvocation = 20_002,
    RolesNotFound = 20_003,

    UserFactoryInvalidBackendVersion = 21_001,

    UserRegistryUserContractAlreadyExists = 30_001,
    UserRegistryNoUserContractFound = 30_002,
    UserRegistryCannotChangeToSameOwner = 30_003,
}

impl ErrorCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ErrorCode::Ok)
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}
