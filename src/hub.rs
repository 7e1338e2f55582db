//! Runtime hub: wiring, address space and the transaction boundary.
//!
//! The hub owns every deployed component and serializes all operations. Each
//! public operation runs inside [`Hub::transact`], which meters gas from a
//! clean meter and makes the call atomic: a fault restores the pre-call
//! snapshot of the component maps and the environment and rolls the keyed
//! store back to its checkpoint, so no partial write of an aborted call is
//! ever observable.
//!
//! External collaborators (the authorization gateway, the signature
//! recoverer, registered call targets) sit outside the snapshot on purpose:
//! they model the world beyond the system's own state.

use crate::account::{
    BackendProvider, BackendV1, CallTarget, ForwardOutcome, Host, RecoveryCoordinator,
    UserBackend, UserFactory, UserProxy, UserRegistry, UserRouter, UserState, REGISTRY_NAMESPACE,
};
use crate::auth::{selectors, AuthorizationGateway, OpenGateway, Selector};
use crate::crypto::{KeyTableRecoverer, SignatureRecoverer, VrsSignature};
use crate::env::{CallCtx, Env};
use crate::error::{ErrorCode, Fault};
use crate::events::{Event, EventLog};
use crate::gas::TX_BASE_GAS;
use crate::types::{Address, TxId, Value};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Gas accounting of the last committed transaction.
#[derive(Debug, Clone, Copy)]
pub struct GasReceipt {
    pub gas_used: u64,
    pub gas_price: Value,
}

impl GasReceipt {
    /// What the sender paid for the call.
    pub fn fee(&self) -> Value {
        Value::from(self.gas_used) * self.gas_price
    }
}

struct Snapshot {
    env: Env,
    routers: HashMap<Address, UserRouter>,
    proxies: HashMap<Address, UserProxy>,
    providers: HashMap<Address, BackendProvider>,
    factory: Option<UserFactory>,
    registry: Option<UserRegistry>,
    recovery: Option<RecoveryCoordinator>,
    alloc: u64,
}

pub struct Hub {
    env: Env,
    store: crate::storage::KeyedStore,
    routers: HashMap<Address, UserRouter>,
    proxies: HashMap<Address, UserProxy>,
    targets: HashMap<Address, Box<dyn CallTarget>>,
    providers: HashMap<Address, BackendProvider>,
    factory: Option<UserFactory>,
    registry: Option<UserRegistry>,
    recovery: Option<RecoveryCoordinator>,
    gateway: Box<dyn AuthorizationGateway>,
    recoverer: Box<dyn SignatureRecoverer>,
    alloc: u64,
    last_receipt: Option<GasReceipt>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            env: Env::new(),
            store: crate::storage::KeyedStore::new(),
            routers: HashMap::new(),
            proxies: HashMap::new(),
            targets: HashMap::new(),
            providers: HashMap::new(),
            factory: None,
            registry: None,
            recovery: None,
            gateway: Box::new(OpenGateway),
            recoverer: Box::new(KeyTableRecoverer::new()),
            alloc: 0,
            last_receipt: None,
        }
    }

    // ---- wiring -----------------------------------------------------------

    pub fn set_gateway(&mut self, gateway: Box<dyn AuthorizationGateway>) {
        self.gateway = gateway;
    }

    pub fn set_recoverer(&mut self, recoverer: Box<dyn SignatureRecoverer>) {
        self.recoverer = recoverer;
    }

    pub fn register_target(&mut self, addr: Address, target: Box<dyn CallTarget>) {
        self.targets.insert(addr, target);
    }

    fn alloc_address(&mut self, tag: &str) -> Address {
        self.alloc += 1;
        Address::derive(tag, self.alloc)
    }

    /// Deploy a provider serving the baseline backend.
    pub fn deploy_provider(&mut self) -> Address {
        self.deploy_provider_with(Arc::new(BackendV1))
    }

    pub fn deploy_provider_with(&mut self, backend: Arc<dyn UserBackend>) -> Address {
        let addr = self.alloc_address("backend-provider");
        self.providers
            .insert(addr, BackendProvider::new(addr, backend));
        info!(provider = %addr, "backend provider deployed");
        addr
    }

    /// Register an additional backend version with a provider. Deployment
    /// step; switching the current version is the gated `set_user_backend`.
    pub fn register_backend(
        &mut self,
        provider: Address,
        backend: Arc<dyn UserBackend>,
    ) -> Result<(), Fault> {
        self.providers
            .get_mut(&provider)
            .ok_or(Fault::UnknownProvider(provider))?
            .register_backend(backend);
        Ok(())
    }

    pub fn deploy_registry(&mut self) -> Result<Address, Fault> {
        let addr = self.alloc_address("user-registry");
        self.store.set_manager(addr, addr)?;
        self.store.give_access(addr, addr, REGISTRY_NAMESPACE)?;
        self.registry = Some(UserRegistry::new(addr));
        info!(registry = %addr, "user registry deployed");
        Ok(addr)
    }

    pub fn deploy_factory(&mut self, provider: Address) -> Result<Address, Fault> {
        if !self.providers.contains_key(&provider) {
            return Err(Fault::UnknownProvider(provider));
        }
        let addr = self.alloc_address("user-factory");
        self.factory = Some(UserFactory::new(addr, provider)?);
        info!(factory = %addr, "user factory deployed");
        Ok(addr)
    }

    pub fn deploy_recovery(&mut self) -> Address {
        let addr = self.alloc_address("recovery");
        self.recovery = Some(RecoveryCoordinator::new(addr));
        addr
    }

    // ---- environment ------------------------------------------------------

    pub fn mint(&mut self, addr: Address, value: Value) {
        self.env.mint(addr, value);
    }

    pub fn balance_of(&self, addr: Address) -> Value {
        self.env.balance_of(addr)
    }

    pub fn events(&self) -> &EventLog {
        &self.env.events
    }

    pub fn last_receipt(&self) -> Option<GasReceipt> {
        self.last_receipt
    }

    // ---- queries ----------------------------------------------------------

    fn router(&self, user: Address) -> Result<&UserRouter, Fault> {
        self.routers.get(&user).ok_or(Fault::UnknownAccount(user))
    }

    pub fn get_user_owner(&self, user: Address) -> Result<Address, Fault> {
        Ok(self.router(user)?.get_user_owner())
    }

    pub fn get_oracle(&self, user: Address) -> Result<Address, Fault> {
        self.router(user)?.get_oracle()
    }

    pub fn get_use_2fa(&self, user: Address) -> Result<bool, Fault> {
        self.router(user)?.get_use_2fa()
    }

    pub fn backend_version_of(&self, user: Address) -> Result<u32, Fault> {
        Ok(self.router(user)?.backend_version())
    }

    pub fn proxy_of(&self, user: Address) -> Result<Address, Fault> {
        Ok(self.router(user)?.state.proxy)
    }

    pub fn pending_transaction(&self, user: Address, id: TxId) -> Option<crate::account::MultisigTx> {
        self.routers
            .get(&user)
            .and_then(|r| r.state.transactions.get(&id))
            .cloned()
    }

    pub fn get_user_contracts(&self, owner: Address) -> Result<Vec<Address>, Fault> {
        let registry = self
            .registry
            .as_ref()
            .ok_or(Fault::NotDeployed("user registry"))?;
        registry.get_user_contracts(&self.store, owner)
    }

    // ---- transaction machinery -------------------------------------------

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            env: self.env.clone(),
            routers: self.routers.clone(),
            proxies: self.proxies.clone(),
            providers: self.providers.clone(),
            factory: self.factory.clone(),
            registry: self.registry.clone(),
            recovery: self.recovery.clone(),
            alloc: self.alloc,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.env = snapshot.env;
        self.routers = snapshot.routers;
        self.proxies = snapshot.proxies;
        self.providers = snapshot.providers;
        self.factory = snapshot.factory;
        self.registry = snapshot.registry;
        self.recovery = snapshot.recovery;
        self.alloc = snapshot.alloc;
    }

    fn transact<T>(
        &mut self,
        ctx: CallCtx,
        calldata: &[u8],
        f: impl FnOnce(&mut Self) -> Result<T, Fault>,
    ) -> Result<T, Fault> {
        self.env.meter.reset();
        self.env.meter.charge(TX_BASE_GAS);
        self.env.meter.charge_calldata(calldata);
        let snapshot = self.snapshot();
        let mark = self.store.checkpoint();
        match f(self) {
            Ok(value) => {
                self.store.commit(mark);
                self.last_receipt = Some(GasReceipt {
                    gas_used: self.env.meter.spent(),
                    gas_price: ctx.gas_price,
                });
                Ok(value)
            }
            Err(fault) => {
                warn!(%fault, "call aborted, state rolled back");
                self.restore(snapshot);
                self.store.rollback(mark);
                self.last_receipt = None;
                Err(fault)
            }
        }
    }

    /// Resolve the account's backend through its provider and run `f` with a
    /// host view. The router leaves the map for the duration so the host can
    /// borrow the rest of the hub mutably.
    fn with_account<T>(
        &mut self,
        user: Address,
        f: impl FnOnce(&dyn UserBackend, &mut Host<'_>, &mut UserState) -> Result<T, Fault>,
    ) -> Result<T, Fault> {
        let mut router = self
            .routers
            .remove(&user)
            .ok_or(Fault::UnknownAccount(user))?;
        let result = self.run_backend(&mut router, f);
        self.routers.insert(user, router);
        result
    }

    fn run_backend<T>(
        &mut self,
        router: &mut UserRouter,
        f: impl FnOnce(&dyn UserBackend, &mut Host<'_>, &mut UserState) -> Result<T, Fault>,
    ) -> Result<T, Fault> {
        let provider_addr = router.state.backend_provider;
        let (backend, cashback_enabled, registry_addr) = {
            let provider = self
                .providers
                .get(&provider_addr)
                .ok_or(Fault::UnknownProvider(provider_addr))?;
            (provider.backend(), provider.use_cashback, provider.user_registry)
        };
        let registry = registry_addr
            .and_then(|addr| self.registry.clone().filter(|r| r.address == addr));
        let mut host = Host {
            self_addr: router.address,
            env: &mut self.env,
            store: &mut self.store,
            proxies: &mut self.proxies,
            targets: &mut self.targets,
            recoverer: self.recoverer.as_ref(),
            registry,
            cashback_enabled,
        };
        backend.activate(&mut host, &mut router.state);
        f(backend.as_ref(), &mut host, &mut router.state)
    }

    fn authorize(&mut self, caller: Address, target: Address, selector: Selector) -> bool {
        self.gateway.can_call(caller, target, selector)
    }

    fn deny(&mut self) -> ErrorCode {
        self.env.emit(Event::ErrorCode {
            error_code: ErrorCode::Unauthorized,
        });
        ErrorCode::Unauthorized
    }

    // ---- factory operations ----------------------------------------------

    /// Stamp out a fresh router/proxy pair wired with the factory defaults
    /// and index it with the provider's registry.
    pub fn create_user_with_proxy_and_recovery(
        &mut self,
        ctx: CallCtx,
        owner: Address,
        use_2fa: bool,
    ) -> Result<(Address, Address), Fault> {
        self.transact(ctx, owner.as_bytes(), |hub| {
            let factory = hub.factory.clone().ok_or(Fault::NotDeployed("user factory"))?;
            if owner.is_zero() {
                return Err(Fault::ZeroAddress("owner"));
            }
            let user = hub.alloc_address("user-router");
            let proxy = hub.alloc_address("user-proxy");
            let mut router = UserRouter::new(
                user,
                owner,
                factory.user_recovery,
                factory.backend_provider,
                factory.address,
            )?;
            router.state.proxy = proxy;
            router.state.use_cashback = hub
                .providers
                .get(&factory.backend_provider)
                .map(|p| p.use_cashback)
                .unwrap_or(true);
            hub.proxies.insert(proxy, UserProxy::new(proxy, user));
            hub.routers.insert(user, router);

            let init_ctx = CallCtx::from(factory.address).with_gas_price(ctx.gas_price);
            hub.with_account(user, |backend, host, state| {
                backend.init(host, state, init_ctx, factory.oracle, use_2fa)
            })?;

            let registry_addr = hub
                .providers
                .get(&factory.backend_provider)
                .and_then(|p| p.user_registry);
            if let Some(registry) = hub
                .registry
                .clone()
                .filter(|r| Some(r.address) == registry_addr)
            {
                registry.add_user_contract(&mut hub.store, &mut hub.env, user, owner)?;
            }

            hub.env.emit(Event::UserCreated {
                user,
                proxy,
                recovery_contract: factory.user_recovery,
                owner,
            });
            info!(%user, %proxy, %owner, "user created");
            Ok((user, proxy))
        })
    }

    pub fn set_factory_oracle(&mut self, ctx: CallCtx, oracle: Address) -> Result<ErrorCode, Fault> {
        self.transact(ctx, oracle.as_bytes(), |hub| {
            let factory_addr = hub
                .factory
                .as_ref()
                .ok_or(Fault::NotDeployed("user factory"))?
                .address;
            if !hub.authorize(ctx.sender, factory_addr, selectors::set_oracle_address()) {
                return Ok(hub.deny());
            }
            if let Some(factory) = hub.factory.as_mut() {
                factory.set_oracle_address(oracle)?;
            }
            Ok(ErrorCode::Ok)
        })
    }

    pub fn set_factory_recovery(
        &mut self,
        ctx: CallCtx,
        recovery: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, recovery.as_bytes(), |hub| {
            let factory_addr = hub
                .factory
                .as_ref()
                .ok_or(Fault::NotDeployed("user factory"))?
                .address;
            if !hub.authorize(ctx.sender, factory_addr, selectors::set_user_recovery_address()) {
                return Ok(hub.deny());
            }
            if let Some(factory) = hub.factory.as_mut() {
                factory.set_user_recovery_address(recovery)?;
            }
            Ok(ErrorCode::Ok)
        })
    }

    pub fn set_factory_backend_provider(
        &mut self,
        ctx: CallCtx,
        provider: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, provider.as_bytes(), |hub| {
            let factory_addr = hub
                .factory
                .as_ref()
                .ok_or(Fault::NotDeployed("user factory"))?
                .address;
            if !hub.authorize(ctx.sender, factory_addr, selectors::set_user_backend_provider()) {
                return Ok(hub.deny());
            }
            if !hub.providers.contains_key(&provider) {
                return Err(Fault::UnknownProvider(provider));
            }
            if let Some(factory) = hub.factory.as_mut() {
                factory.set_user_backend_provider(provider)?;
            }
            Ok(ErrorCode::Ok)
        })
    }

    /// Re-point one account at the factory's current provider. Pointing an
    /// account at the provider it already uses is reported, not applied.
    pub fn update_backend_provider_for_user(
        &mut self,
        ctx: CallCtx,
        user: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, user.as_bytes(), |hub| {
            let factory = hub.factory.clone().ok_or(Fault::NotDeployed("user factory"))?;
            if !hub.authorize(
                ctx.sender,
                factory.address,
                selectors::update_backend_provider_for_user(),
            ) {
                return Ok(hub.deny());
            }
            if !hub.providers.contains_key(&factory.backend_provider) {
                return Err(Fault::UnknownProvider(factory.backend_provider));
            }
            let router = hub
                .routers
                .get_mut(&user)
                .ok_or(Fault::UnknownAccount(user))?;
            if router.state.issuer != factory.address {
                // the factory only upgrades accounts it issued
                hub.env.emit(Event::ErrorCode {
                    error_code: ErrorCode::Unauthorized,
                });
                return Ok(ErrorCode::Unauthorized);
            }
            if router.state.backend_provider == factory.backend_provider {
                let code = ErrorCode::UserFactoryInvalidBackendVersion;
                hub.env.emit(Event::ErrorCode { error_code: code });
                return Ok(code);
            }
            router.state.backend_provider = factory.backend_provider;
            Ok(ErrorCode::Ok)
        })
    }

    // ---- manual account construction -------------------------------------

    /// Create a bare router/proxy pair outside the factory path. The caller
    /// becomes the issuer and must run `init_user` before the account works.
    pub fn create_router(
        &mut self,
        ctx: CallCtx,
        owner: Address,
        recovery_contract: Address,
        provider: Address,
    ) -> Result<(Address, Address), Fault> {
        self.transact(ctx, owner.as_bytes(), |hub| {
            if !hub.providers.contains_key(&provider) {
                return Err(Fault::UnknownProvider(provider));
            }
            let user = hub.alloc_address("user-router");
            let proxy = hub.alloc_address("user-proxy");
            let mut router =
                UserRouter::new(user, owner, recovery_contract, provider, ctx.sender)?;
            router.state.proxy = proxy;
            hub.proxies.insert(proxy, UserProxy::new(proxy, user));
            hub.routers.insert(user, router);
            Ok((user, proxy))
        })
    }

    pub fn init_user(
        &mut self,
        ctx: CallCtx,
        user: Address,
        oracle: Address,
        enable_2fa: bool,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, oracle.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.init(host, state, ctx, oracle, enable_2fa)
            })
        })
    }

    // ---- account operations ----------------------------------------------

    pub fn forward(
        &mut self,
        ctx: CallCtx,
        user: Address,
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
    ) -> Result<ForwardOutcome, Fault> {
        self.transact(ctx, data, |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.forward(host, state, ctx, destination, data, value, throw_on_failed_call)
            })
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn forward_with_vrs(
        &mut self,
        ctx: CallCtx,
        user: Address,
        pass: &[u8],
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
        signature: &VrsSignature,
    ) -> Result<ForwardOutcome, Fault> {
        self.transact(ctx, data, |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.forward_with_vrs(
                    host,
                    state,
                    ctx,
                    pass,
                    destination,
                    data,
                    value,
                    throw_on_failed_call,
                    signature,
                )
            })
        })
    }

    pub fn confirm_transaction(
        &mut self,
        ctx: CallCtx,
        user: Address,
        id: TxId,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, &id.to_be_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.confirm_transaction(host, state, ctx, id)
            })
        })
    }

    pub fn set_2fa(&mut self, ctx: CallCtx, user: Address, enable: bool) -> Result<ErrorCode, Fault> {
        self.transact(ctx, &[enable as u8], |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.set_2fa(host, state, ctx, enable)
            })
        })
    }

    pub fn set_oracle(
        &mut self,
        ctx: CallCtx,
        user: Address,
        oracle: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, oracle.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.set_oracle(host, state, ctx, oracle)
            })
        })
    }

    pub fn set_user_proxy(
        &mut self,
        ctx: CallCtx,
        user: Address,
        proxy: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, proxy.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.set_user_proxy(host, state, ctx, proxy)
            })
        })
    }

    pub fn set_recovery_contract(
        &mut self,
        ctx: CallCtx,
        user: Address,
        recovery: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, recovery.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.set_recovery_contract(host, state, ctx, recovery)
            })
        })
    }

    pub fn add_third_party_owner(
        &mut self,
        ctx: CallCtx,
        user: Address,
        addr: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, addr.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.add_third_party_owner(host, state, ctx, addr)
            })
        })
    }

    pub fn revoke_third_party_owner(
        &mut self,
        ctx: CallCtx,
        user: Address,
        addr: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, addr.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.revoke_third_party_owner(host, state, ctx, addr)
            })
        })
    }

    pub fn transfer_ownership(
        &mut self,
        ctx: CallCtx,
        user: Address,
        new_owner: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, new_owner.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.transfer_ownership(host, state, ctx, new_owner)
            })
        })
    }

    pub fn change_contract_ownership(
        &mut self,
        ctx: CallCtx,
        user: Address,
        to: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, to.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.change_contract_ownership(host, state, ctx, to)
            })
        })
    }

    pub fn claim_contract_ownership(
        &mut self,
        ctx: CallCtx,
        user: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, user.as_bytes(), |hub| {
            hub.with_account(user, |backend, host, state| {
                backend.claim_contract_ownership(host, state, ctx)
            })
        })
    }

    // ---- recovery ---------------------------------------------------------

    /// Replace a lost owner key through the recovery coordinator. Gated at
    /// the coordinator; a recovery the account refuses aborts the call.
    pub fn recover_user(
        &mut self,
        ctx: CallCtx,
        user: Address,
        new_owner: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, new_owner.as_bytes(), |hub| {
            let coordinator = hub
                .recovery
                .clone()
                .ok_or(Fault::NotDeployed("recovery coordinator"))?;
            if !hub.authorize(ctx.sender, coordinator.address, selectors::recover_user()) {
                return Ok(hub.deny());
            }
            let prev_user = hub
                .routers
                .get(&user)
                .ok_or(Fault::UnknownAccount(user))?
                .state
                .owner;
            let recover_ctx = CallCtx::from(coordinator.address).with_gas_price(ctx.gas_price);
            let code = hub.with_account(user, |backend, host, state| {
                backend.recover_user(host, state, recover_ctx, new_owner)
            })?;
            if code != ErrorCode::Ok {
                return Err(Fault::RecoveryFailed(user));
            }
            hub.env.emit(Event::UserRecovered {
                user_contract: user,
                prev_user,
                new_user: new_owner,
            });
            Ok(ErrorCode::Ok)
        })
    }

    // ---- registry operations ----------------------------------------------

    pub fn add_user_contract(
        &mut self,
        ctx: CallCtx,
        user_contract: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, user_contract.as_bytes(), |hub| {
            let registry = hub
                .registry
                .clone()
                .ok_or(Fault::NotDeployed("user registry"))?;
            if !hub.authorize(ctx.sender, registry.address, selectors::add_user_contract()) {
                return Ok(hub.deny());
            }
            let owner = hub
                .routers
                .get(&user_contract)
                .ok_or(Fault::UnknownAccount(user_contract))?
                .state
                .owner;
            registry.add_user_contract(&mut hub.store, &mut hub.env, user_contract, owner)
        })
    }

    pub fn remove_user_contract_from(
        &mut self,
        ctx: CallCtx,
        user_contract: Address,
        owner: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, user_contract.as_bytes(), |hub| {
            let registry = hub
                .registry
                .clone()
                .ok_or(Fault::NotDeployed("user registry"))?;
            if !hub.authorize(
                ctx.sender,
                registry.address,
                selectors::remove_user_contract_from(),
            ) {
                return Ok(hub.deny());
            }
            registry.remove_user_contract_from(&mut hub.store, &mut hub.env, user_contract, owner)
        })
    }

    /// Open notification that an indexed account changed hands. The new
    /// owner is read from the account itself, never from the notifier.
    pub fn user_ownership_changed(
        &mut self,
        ctx: CallCtx,
        user_contract: Address,
        old_owner: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, user_contract.as_bytes(), |hub| {
            let registry = hub
                .registry
                .clone()
                .ok_or(Fault::NotDeployed("user registry"))?;
            let new_owner = hub
                .routers
                .get(&user_contract)
                .ok_or(Fault::UnknownAccount(user_contract))?
                .state
                .owner;
            registry.user_ownership_changed(
                &mut hub.store,
                &mut hub.env,
                user_contract,
                old_owner,
                new_owner,
            )
        })
    }

    // ---- provider operations ----------------------------------------------

    pub fn set_user_backend(
        &mut self,
        ctx: CallCtx,
        provider: Address,
        version: u32,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, &version.to_be_bytes(), |hub| {
            if !hub.authorize(ctx.sender, provider, selectors::set_user_backend()) {
                return Ok(hub.deny());
            }
            hub.providers
                .get_mut(&provider)
                .ok_or(Fault::UnknownProvider(provider))?
                .set_current(version)?;
            Ok(ErrorCode::Ok)
        })
    }

    pub fn set_user_registry(
        &mut self,
        ctx: CallCtx,
        provider: Address,
        registry: Address,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, registry.as_bytes(), |hub| {
            if !hub.authorize(ctx.sender, provider, selectors::set_user_registry()) {
                return Ok(hub.deny());
            }
            let p = hub
                .providers
                .get_mut(&provider)
                .ok_or(Fault::UnknownProvider(provider))?;
            p.user_registry = if registry.is_zero() { None } else { Some(registry) };
            Ok(ErrorCode::Ok)
        })
    }

    pub fn set_use_cashback(
        &mut self,
        ctx: CallCtx,
        provider: Address,
        use_cashback: bool,
    ) -> Result<ErrorCode, Fault> {
        self.transact(ctx, &[use_cashback as u8], |hub| {
            if !hub.authorize(ctx.sender, provider, selectors::set_use_cashback()) {
                return Ok(hub.deny());
            }
            hub.providers
                .get_mut(&provider)
                .ok_or(Fault::UnknownProvider(provider))?
                .use_cashback = use_cashback;
            Ok(ErrorCode::Ok)
        })
    }

    // ---- proxy operations --------------------------------------------------

    /// Plain value transfer into a proxy.
    pub fn send_to_proxy(&mut self, ctx: CallCtx, proxy: Address) -> Result<(), Fault> {
        self.transact(ctx, &[], |hub| {
            let proxy = hub
                .proxies
                .get(&proxy)
                .cloned()
                .ok_or(Fault::UnknownProxy(proxy))?;
            proxy.receive_value(&mut hub.env, ctx.sender, ctx.value)
        })
    }

    /// Drive a proxy directly, bypassing the router. Only the owning router
    /// address gets anything but a zeroed reply; exposed for completeness
    /// and for exercising the proxy contract on its own.
    pub fn proxy_forward(
        &mut self,
        ctx: CallCtx,
        proxy: Address,
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
    ) -> Result<Option<Vec<u8>>, Fault> {
        self.transact(ctx, data, |hub| {
            let proxy = hub
                .proxies
                .get(&proxy)
                .cloned()
                .ok_or(Fault::UnknownProxy(proxy))?;
            proxy.forward(
                &mut hub.env,
                &mut hub.targets,
                ctx.sender,
                destination,
                data,
                value,
                throw_on_failed_call,
            )
        })
    }
}
