//! Authorization gateway seam.
//!
//! Every privileged operation asks the gateway "may `caller` invoke
//! `selector` on `target`?". The gateway itself (a role/capability backend)
//! is an external collaborator; this module defines the call contract plus
//! the doubles the test suites script against it.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fmt;

/// 4-byte operation selector, derived from the operation's signature string.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Selector of a signature like `"addUserContract(address)"`.
    pub fn of(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        Selector([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// Selectors of the gated operations.
pub mod selectors {
    use super::Selector;

    pub fn add_user_contract() -> Selector {
        Selector::of("addUserContract(address)")
    }
    pub fn remove_user_contract_from() -> Selector {
        Selector::of("removeUserContractFrom(address,address)")
    }
    pub fn recover_user() -> Selector {
        Selector::of("recoverUser(address,address)")
    }
    pub fn set_oracle_address() -> Selector {
        Selector::of("setOracleAddress(address)")
    }
    pub fn set_user_recovery_address() -> Selector {
        Selector::of("setUserRecoveryAddress(address)")
    }
    pub fn set_user_backend_provider() -> Selector {
        Selector::of("setUserBackendProvider(address)")
    }
    pub fn update_backend_provider_for_user() -> Selector {
        Selector::of("updateBackendProviderForUser(address)")
    }
    pub fn set_user_backend() -> Selector {
        Selector::of("setUserBackend(uint)")
    }
    pub fn set_user_registry() -> Selector {
        Selector::of("setUserRegistry(address)")
    }
    pub fn forward() -> Selector {
        Selector::of("forward(address,bytes,uint256,bool)")
    }
    pub fn forward_with_vrs() -> Selector {
        Selector::of("forwardWithVRS(bytes,address,bytes,uint256,bool,uint8,bytes32,bytes32)")
    }
    pub fn set_use_cashback() -> Selector {
        Selector::of("setUseCashback(bool)")
    }
}

/// The external role/capability decision. Must be side-effect free from the
/// caller's point of view.
pub trait AuthorizationGateway {
    fn can_call(&mut self, caller: Address, target: Address, selector: Selector) -> bool;
}

/// Gateway that allows everything. Default wiring for workflows where roles
/// are managed elsewhere.
#[derive(Debug, Default, Clone)]
pub struct OpenGateway;

impl AuthorizationGateway for OpenGateway {
    fn can_call(&mut self, _caller: Address, _target: Address, _selector: Selector) -> bool {
        true
    }
}

/// Expectation-scripted gateway, the moral equivalent of the Mock contract
/// the original suites pointed the roles library at: each expected query is
/// enqueued with its answer, consumed in order, and anything unexpected is
/// denied and recorded.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    expectations: VecDeque<(Address, Address, Selector, bool)>,
    unexpected: Vec<(Address, Address, Selector)>,
    calls: usize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&mut self, caller: Address, target: Address, selector: Selector, allow: bool) {
        self.expectations.push_back((caller, target, selector, allow));
    }

    pub fn expectations_left(&self) -> usize {
        self.expectations.len()
    }

    pub fn calls_count(&self) -> usize {
        self.calls
    }

    pub fn unexpected(&self) -> &[(Address, Address, Selector)] {
        &self.unexpected
    }
}

impl AuthorizationGateway for ScriptedGateway {
    fn can_call(&mut self, caller: Address, target: Address, selector: Selector) -> bool {
        self.calls += 1;
        match self.expectations.front() {
            Some((c, t, s, allow)) if *c == caller && *t == target && *s == selector => {
                let allow = *allow;
                self.expectations.pop_front();
                allow
            }
            _ => {
                self.unexpected.push((caller, target, selector));
                false
            }
        }
    }
}
