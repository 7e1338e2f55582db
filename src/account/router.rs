//! Account router: the stable identity that delegates to versioned logic.
//!
//! A router owns nothing but its address and the canonical state. All
//! behavior comes from the backend its provider currently names, which is
//! resolved fresh on every call.

use crate::error::Fault;
use crate::types::Address;

use super::state::UserState;

#[derive(Debug, Clone)]
pub struct UserRouter {
    pub address: Address,
    pub state: UserState,
}

impl UserRouter {
    pub fn new(
        address: Address,
        owner: Address,
        recovery_contract: Address,
        backend_provider: Address,
        issuer: Address,
    ) -> Result<Self, Fault> {
        if owner.is_zero() {
            return Err(Fault::ZeroAddress("owner"));
        }
        if backend_provider.is_zero() {
            return Err(Fault::ZeroAddress("backend provider"));
        }
        Ok(Self {
            address,
            state: UserState::new(owner, recovery_contract, backend_provider, issuer),
        })
    }

    pub fn get_user_owner(&self) -> Address {
        self.state.owner
    }

    /// Oracle of an initialized account. Asking before init is a programming
    /// error on the caller's side and faults.
    pub fn get_oracle(&self) -> Result<Address, Fault> {
        self.ensure_initialized()?;
        Ok(self.state.oracle)
    }

    pub fn get_use_2fa(&self) -> Result<bool, Fault> {
        self.ensure_initialized()?;
        Ok(self.state.use_2fa)
    }

    pub fn backend_version(&self) -> u32 {
        self.state.active_version
    }

    fn ensure_initialized(&self) -> Result<(), Fault> {
        if self.state.initialized {
            Ok(())
        } else {
            Err(Fault::NotInitialized(self.address))
        }
    }
}
