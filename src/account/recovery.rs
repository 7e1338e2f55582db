//! Recovery coordinator.
//!
//! A thin, auth-gated entry point in front of the accounts' recovery bypass.
//! Authorization is checked against the coordinator's own address, so one
//! roles policy covers recovery across every account that trusts it.

use crate::types::Address;

#[derive(Debug, Clone)]
pub struct RecoveryCoordinator {
    pub address: Address,
}

impl RecoveryCoordinator {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}
