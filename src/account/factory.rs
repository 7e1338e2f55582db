//! Factory configuration for stamping out router/proxy pairs.
//!
//! The factory holds the defaults new accounts are wired with: which
//! provider serves their logic, which oracle co-signs, and which recovery
//! contract can bail the owner out. The actual allocation happens in the
//! hub, which owns the address space; the factory validates and records the
//! knobs.

use crate::error::Fault;
use crate::types::Address;

#[derive(Debug, Clone)]
pub struct UserFactory {
    pub address: Address,
    pub backend_provider: Address,
    pub oracle: Address,
    pub user_recovery: Address,
}

impl UserFactory {
    pub fn new(address: Address, backend_provider: Address) -> Result<Self, Fault> {
        if backend_provider.is_zero() {
            return Err(Fault::ZeroAddress("backend provider"));
        }
        Ok(Self {
            address,
            backend_provider,
            oracle: Address::ZERO,
            user_recovery: Address::ZERO,
        })
    }

    pub fn set_oracle_address(&mut self, oracle: Address) -> Result<(), Fault> {
        if oracle.is_zero() {
            return Err(Fault::ZeroAddress("oracle"));
        }
        self.oracle = oracle;
        Ok(())
    }

    pub fn set_user_recovery_address(&mut self, recovery: Address) -> Result<(), Fault> {
        if recovery.is_zero() {
            return Err(Fault::ZeroAddress("recovery contract"));
        }
        self.user_recovery = recovery;
        Ok(())
    }

    pub fn set_user_backend_provider(&mut self, provider: Address) -> Result<(), Fault> {
        if provider.is_zero() {
            return Err(Fault::ZeroAddress("backend provider"));
        }
        self.backend_provider = provider;
        Ok(())
    }
}
