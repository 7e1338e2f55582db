//! Owner-to-accounts index.
//!
//! The registry keeps, per owner address, the list of account routers that
//! owner controls. It persists through the shared keyed store under its own
//! namespace and reports policy outcomes as codes, so a batched caller can
//! registry-index a hundred accounts without one duplicate aborting the run.

use crate::env::Env;
use crate::error::{ErrorCode, Fault};
use crate::events::Event;
use crate::gas::{SLOAD_GAS, SSTORE_GAS};
use crate::storage::KeyedStore;
use crate::types::Address;
use tracing::info;

/// Storage namespace the registry writes under.
pub const REGISTRY_NAMESPACE: &str = "UserRegistry";

#[derive(Debug, Clone)]
pub struct UserRegistry {
    pub address: Address,
}

impl UserRegistry {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    fn owner_key(owner: Address) -> String {
        hex::encode(owner.as_bytes())
    }

    fn contracts_of(&self, store: &KeyedStore, owner: Address) -> Result<Vec<Address>, Fault> {
        Ok(store
            .get(self.address, REGISTRY_NAMESPACE, &Self::owner_key(owner))?
            .unwrap_or_default())
    }

    fn put_contracts(
        &self,
        store: &mut KeyedStore,
        env: &mut Env,
        owner: Address,
        contracts: &[Address],
    ) -> Result<(), Fault> {
        env.meter.charge(SSTORE_GAS);
        if contracts.is_empty() {
            store.remove(self.address, REGISTRY_NAMESPACE, &Self::owner_key(owner))
        } else {
            store.set(self.address, REGISTRY_NAMESPACE, &Self::owner_key(owner), contracts)
        }
    }

    /// All account routers indexed under `owner`.
    pub fn get_user_contracts(
        &self,
        store: &KeyedStore,
        owner: Address,
    ) -> Result<Vec<Address>, Fault> {
        self.contracts_of(store, owner)
    }

    /// Index `user_contract` under `owner`.
    pub fn add_user_contract(
        &self,
        store: &mut KeyedStore,
        env: &mut Env,
        user_contract: Address,
        owner: Address,
    ) -> Result<ErrorCode, Fault> {
        if user_contract.is_zero() {
            return Err(Fault::ZeroAddress("user contract"));
        }
        if owner.is_zero() {
            return Err(Fault::ZeroAddress("user contract owner"));
        }

        env.meter.charge(SLOAD_GAS);
        let mut contracts = self.contracts_of(store, owner)?;
        if contracts.contains(&user_contract) {
            let code = ErrorCode::UserRegistryUserContractAlreadyExists;
            env.emit(Event::ErrorCode { error_code: code });
            return Ok(code);
        }
        contracts.push(user_contract);
        self.put_contracts(store, env, owner, &contracts)?;
        env.emit(Event::UserContractAdded {
            self_: self.address,
            user_contract,
            owner,
        });
        Ok(ErrorCode::Ok)
    }

    /// Drop `user_contract` from `owner`'s index.
    pub fn remove_user_contract_from(
        &self,
        store: &mut KeyedStore,
        env: &mut Env,
        user_contract: Address,
        owner: Address,
    ) -> Result<ErrorCode, Fault> {
        env.meter.charge(SLOAD_GAS);
        let mut contracts = self.contracts_of(store, owner)?;
        match contracts.iter().position(|c| *c == user_contract) {
            Some(at) => {
                contracts.remove(at);
                self.put_contracts(store, env, owner, &contracts)?;
                env.emit(Event::UserContractRemoved {
                    self_: self.address,
                    user_contract,
                    owner,
                });
                Ok(ErrorCode::Ok)
            }
            None => {
                let code = ErrorCode::UserRegistryNoUserContractFound;
                env.emit(Event::ErrorCode { error_code: code });
                Ok(code)
            }
        }
    }

    /// Re-index `user_contract` after its owner moved from `old_owner` to
    /// `new_owner`. Open to any caller: the answer depends on nothing but the
    /// index and the account's real owner, so a stale or bogus notification
    /// can only produce an error code.
    pub fn user_ownership_changed(
        &self,
        store: &mut KeyedStore,
        env: &mut Env,
        user_contract: Address,
        old_owner: Address,
        new_owner: Address,
    ) -> Result<ErrorCode, Fault> {
        if new_owner == old_owner {
            let code = ErrorCode::UserRegistryCannotChangeToSameOwner;
            env.emit(Event::ErrorCode { error_code: code });
            return Ok(code);
        }

        env.meter.charge(2 * SLOAD_GAS);
        let mut from = self.contracts_of(store, old_owner)?;
        let Some(at) = from.iter().position(|c| *c == user_contract) else {
            let code = ErrorCode::UserRegistryNoUserContractFound;
            env.emit(Event::ErrorCode { error_code: code });
            return Ok(code);
        };
        from.remove(at);
        self.put_contracts(store, env, old_owner, &from)?;

        let mut to = self.contracts_of(store, new_owner)?;
        if to.contains(&user_contract) {
            // already indexed under the new owner: the stale entry just goes
            env.emit(Event::UserContractRemoved {
                self_: self.address,
                user_contract,
                owner: old_owner,
            });
            return Ok(ErrorCode::Ok);
        }
        to.push(user_contract);
        self.put_contracts(store, env, new_owner, &to)?;
        info!(%user_contract, %old_owner, %new_owner, "user contract re-indexed");
        env.emit(Event::UserContractChanged {
            self_: self.address,
            user_contract,
            old_owner,
            owner: new_owner,
        });
        Ok(ErrorCode::Ok)
    }
}
