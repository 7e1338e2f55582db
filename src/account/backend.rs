//! Versioned account logic.
//!
//! A backend is pure logic over the canonical [`UserState`]: it owns no
//! storage of its own and reaches the world only through the [`Host`] handle
//! it is given per call. Routers resolve their backend through a provider at
//! call time, so swapping the provider's current version re-points every
//! account at once; the router notices the version change on its next call
//! and runs the activation hook exactly once.
//!
//! The baseline semantics live in the trait's default methods. A new version
//! overrides what it changes and inherits the rest, which keeps the upgrade
//! diff reviewable.

use crate::auth::selectors;
use crate::crypto::{compose_forward_message, SignatureRecoverer, VrsSignature};
use crate::env::{CallCtx, Env};
use crate::error::{ErrorCode, Fault};
use crate::events::Event;
use crate::gas::{CASHBACK_PAD_GAS, CASHBACK_TAIL_GAS, SLOAD_GAS, SSTORE_GAS};
use crate::storage::KeyedStore;
use crate::types::{Address, TxId, Value};

use super::proxy::{CallTarget, UserProxy};
use super::registry::UserRegistry;
use super::state::{CallerClass, MultisigTx, PendingAction, UserState};

use std::collections::HashMap;
use tracing::debug;

/// Per-call view of the world a backend may touch.
pub struct Host<'a> {
    /// Address of the router being executed.
    pub self_addr: Address,
    pub env: &'a mut Env,
    pub store: &'a mut KeyedStore,
    pub proxies: &'a mut HashMap<Address, UserProxy>,
    pub targets: &'a mut HashMap<Address, Box<dyn CallTarget>>,
    pub recoverer: &'a dyn SignatureRecoverer,
    /// Registry wired through the provider, if any.
    pub registry: Option<UserRegistry>,
    /// Provider-level cashback switch.
    pub cashback_enabled: bool,
}

impl Host<'_> {
    fn proxy_forward(
        &mut self,
        proxy: Address,
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
    ) -> Result<Option<Vec<u8>>, Fault> {
        let proxy = self
            .proxies
            .get(&proxy)
            .cloned()
            .ok_or(Fault::UnknownProxy(proxy))?;
        proxy.forward(
            self.env,
            self.targets,
            self.self_addr,
            destination,
            data,
            value,
            throw_on_failed_call,
        )
    }

    fn notify_ownership_changed(
        &mut self,
        old_owner: Address,
        new_owner: Address,
    ) -> Result<(), Fault> {
        if let Some(registry) = self.registry.clone() {
            registry.user_ownership_changed(
                self.store,
                self.env,
                self.self_addr,
                old_owner,
                new_owner,
            )?;
        }
        Ok(())
    }
}

/// What a forward request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The call went out; carries the destination's reply.
    Executed(Vec<u8>),
    /// Queued as a multisig transaction awaiting the second class.
    Queued(TxId),
    /// The caller was not entitled to forward; zeroed reply.
    Denied,
}

fn ensure_initialized(host: &Host<'_>, state: &UserState) -> Result<(), Fault> {
    if state.initialized {
        Ok(())
    } else {
        Err(Fault::NotInitialized(host.self_addr))
    }
}

fn unauthorized(host: &mut Host<'_>) -> Result<ErrorCode, Fault> {
    host.env.emit(Event::ErrorCode {
        error_code: ErrorCode::Unauthorized,
    });
    Ok(ErrorCode::Unauthorized)
}

/// Run a pending action. `Ok(false)` means a forwarded call failed without
/// the throw flag; every other action either succeeds or faults.
fn apply_action(
    host: &mut Host<'_>,
    state: &mut UserState,
    initiator: Address,
    action: &PendingAction,
) -> Result<bool, Fault> {
    match action {
        // a queued forward reports failure through ExecutionFailure; the
        // throw flag binds the direct path only
        PendingAction::Forward {
            destination,
            value,
            data,
            ..
        } => Ok(host
            .proxy_forward(state.proxy, *destination, data, *value, false)?
            .is_some()),
        PendingAction::Set2fa(enable) => {
            state.use_2fa = *enable;
            host.env.emit(Event::User2FAChanged {
                self_: host.self_addr,
                initiator,
                user: host.self_addr,
                proxy: state.proxy,
                enabled: *enable,
            });
            Ok(true)
        }
        PendingAction::SetOracle(oracle) => {
            state.oracle = *oracle;
            Ok(true)
        }
        PendingAction::SetUserProxy(proxy) => {
            state.proxy = *proxy;
            Ok(true)
        }
        PendingAction::SetRecoveryContract(recovery) => {
            state.recovery_contract = *recovery;
            Ok(true)
        }
        PendingAction::AddThirdPartyOwner(addr) => {
            if state.third_party_owners.insert(*addr) {
                host.env.emit(Event::OwnerAddition { owner: *addr });
            }
            Ok(true)
        }
        PendingAction::RevokeThirdPartyOwner(addr) => {
            if state.third_party_owners.remove(addr) {
                host.env.emit(Event::OwnerRemoval { owner: *addr });
            }
            Ok(true)
        }
    }
}

/// Queue `action`, confirmed by its submitter.
fn submit(
    host: &mut Host<'_>,
    state: &mut UserState,
    ctx: CallCtx,
    destination: Address,
    value: Value,
    data: Vec<u8>,
    action: PendingAction,
) -> TxId {
    let id = state.next_tx_id();
    host.env.meter.charge(SSTORE_GAS);
    state.transactions.insert(
        id,
        MultisigTx {
            destination,
            value,
            data,
            action,
            submitter: ctx.sender,
            executed: false,
            confirmations: [ctx.sender].into_iter().collect(),
        },
    );
    host.env.emit(Event::Submission { transaction_id: id });
    host.env.emit(Event::Confirmation {
        sender: ctx.sender,
        transaction_id: id,
    });
    id
}

/// Admin path: apply immediately, or queue when the account runs 2FA.
/// Arguments are validated before this point, so a queued action is known
/// good at submission time.
fn submit_or_apply(
    host: &mut Host<'_>,
    state: &mut UserState,
    ctx: CallCtx,
    action: PendingAction,
) -> Result<ErrorCode, Fault> {
    if state.use_2fa {
        let self_addr = host.self_addr;
        submit(host, state, ctx, self_addr, 0, Vec::new(), action);
        Ok(ErrorCode::MultisigAdded)
    } else {
        apply_action(host, state, ctx.sender, &action)?;
        Ok(ErrorCode::Ok)
    }
}

/// Reimburse the relayer of the call in flight out of the account's proxy.
/// Priced off the live meter plus the fixed tail the refund itself costs;
/// the pad is the entire overpayment. A proxy too poor to refund does not
/// fail the call.
fn pay_cashback(host: &mut Host<'_>, state: &UserState, ctx: CallCtx) {
    if !(host.cashback_enabled && state.use_cashback) {
        return;
    }
    let refund_gas = host.env.meter.spent() + CASHBACK_TAIL_GAS + CASHBACK_PAD_GAS;
    let refund = Value::from(refund_gas) * ctx.gas_price;
    host.env.try_transfer(state.proxy, ctx.sender, refund);
    host.env.meter.charge(CASHBACK_TAIL_GAS);
}

fn execute_pending(
    host: &mut Host<'_>,
    state: &mut UserState,
    ctx: CallCtx,
    id: TxId,
) -> Result<ErrorCode, Fault> {
    let tx = state
        .transactions
        .get(&id)
        .cloned()
        .ok_or(Fault::UnknownTransaction(id))?;
    let succeeded = apply_action(host, state, tx.submitter, &tx.action)?;
    host.env.meter.charge(SSTORE_GAS);
    if succeeded {
        if let Some(tx) = state.transactions.get_mut(&id) {
            tx.executed = true;
        }
        host.env.emit(Event::Execution { transaction_id: id });
        pay_cashback(host, state, ctx);
    } else {
        // confirmations stay; a signer may confirm again to retry
        host.env.emit(Event::ExecutionFailure { transaction_id: id });
    }
    Ok(ErrorCode::Ok)
}

#[allow(clippy::too_many_arguments)]
pub trait UserBackend {
    fn version(&self) -> u32;

    /// Router-side hook, run when the resolved backend version differs from
    /// the account's active one. Fires once per bump.
    fn activate(&self, host: &mut Host<'_>, state: &mut UserState) {
        if state.active_version == self.version() {
            return;
        }
        let previous = state.active_version;
        state.active_version = self.version();
        if previous != 0 {
            host.env.emit(Event::BumpedUserBackendEvent {
                user: host.self_addr,
                version: self.version(),
            });
        }
    }

    /// One-shot wiring of oracle and 2FA mode. Only the issuer that created
    /// the router may run it.
    fn init(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        oracle: Address,
        enable_2fa: bool,
    ) -> Result<ErrorCode, Fault> {
        if state.initialized {
            return Err(Fault::AlreadyInitialized(host.self_addr));
        }
        if ctx.sender != state.issuer {
            return unauthorized(host);
        }
        if oracle.is_zero() {
            return Err(Fault::ZeroAddress("oracle"));
        }
        state.oracle = oracle;
        state.initialized = true;
        if enable_2fa {
            state.use_2fa = true;
            host.env.emit(Event::User2FAChanged {
                self_: host.self_addr,
                initiator: ctx.sender,
                user: host.self_addr,
                proxy: state.proxy,
                enabled: true,
            });
        }
        Ok(ErrorCode::Ok)
    }

    fn forward(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
    ) -> Result<ForwardOutcome, Fault> {
        ensure_initialized(host, state)?;
        if destination.is_zero() {
            return Err(Fault::ZeroAddress("forward destination"));
        }
        match state.classify(ctx.sender) {
            CallerClass::Owner if state.use_2fa => {
                let id = submit(
                    host,
                    state,
                    ctx,
                    destination,
                    value,
                    data.to_vec(),
                    PendingAction::Forward {
                        destination,
                        value,
                        data: data.to_vec(),
                        throw_on_failed_call,
                    },
                );
                Ok(ForwardOutcome::Queued(id))
            }
            // third-party owners forward directly even under 2FA; they hold
            // no multisig power and cannot queue
            CallerClass::Owner | CallerClass::ThirdParty => {
                let output = host
                    .proxy_forward(state.proxy, destination, data, value, throw_on_failed_call)?
                    .unwrap_or_default();
                Ok(ForwardOutcome::Executed(output))
            }
            _ => {
                debug!(caller = %ctx.sender, user = %host.self_addr, "forward denied");
                host.env.emit(Event::AuthFailedError {
                    self_: host.self_addr,
                    caller: ctx.sender,
                    sig: selectors::forward().0,
                });
                Ok(ForwardOutcome::Denied)
            }
        }
    }

    /// Forward that carries the second factor inline: a signature over the
    /// composed message, recovered and checked against the account oracle.
    /// Lets a relayer run an owner-authored call in one shot instead of the
    /// submit/confirm round trip.
    fn forward_with_vrs(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        pass: &[u8],
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
        signature: &VrsSignature,
    ) -> Result<ForwardOutcome, Fault> {
        ensure_initialized(host, state)?;
        if destination.is_zero() {
            return Err(Fault::ZeroAddress("forward destination"));
        }
        if !matches!(
            state.classify(ctx.sender),
            CallerClass::Owner | CallerClass::ThirdParty
        ) {
            host.env.emit(Event::AuthFailedError {
                self_: host.self_addr,
                caller: ctx.sender,
                sig: selectors::forward_with_vrs().0,
            });
            return Ok(ForwardOutcome::Denied);
        }

        if state.use_2fa {
            let message = compose_forward_message(pass, ctx.sender, destination, data, value);
            let signer = host.recoverer.recover(&message, signature);
            if signer != Some(state.oracle) || state.oracle.is_zero() {
                host.env.emit(Event::ErrorCode {
                    error_code: ErrorCode::Unauthorized,
                });
                return Ok(ForwardOutcome::Denied);
            }
        }

        let output =
            host.proxy_forward(state.proxy, destination, data, value, throw_on_failed_call)?;
        match output {
            Some(output) => {
                if state.use_2fa {
                    pay_cashback(host, state, ctx);
                }
                Ok(ForwardOutcome::Executed(output))
            }
            None => Ok(ForwardOutcome::Executed(Vec::new())),
        }
    }

    /// Add the second confirmation class to a queued transaction, executing
    /// it once both classes are present. Confirming an already fully
    /// confirmed but unexecuted transaction retries its execution.
    fn confirm_transaction(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        id: TxId,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        host.env.meter.charge(SLOAD_GAS);
        let tx = state
            .transactions
            .get(&id)
            .ok_or(Fault::UnknownTransaction(id))?;
        if tx.executed {
            return Err(Fault::AlreadyExecuted(id));
        }
        let is_signer =
            ctx.sender == state.owner || (ctx.sender == state.oracle && !state.oracle.is_zero());
        if !is_signer {
            return Err(Fault::NotASigner(ctx.sender));
        }

        if tx.confirmations.contains(&ctx.sender) {
            if state.is_fully_confirmed(id) {
                return execute_pending(host, state, ctx, id);
            }
            return Err(Fault::AlreadyConfirmed(id, ctx.sender));
        }

        if let Some(tx) = state.transactions.get_mut(&id) {
            tx.confirmations.insert(ctx.sender);
        }
        host.env.emit(Event::Confirmation {
            sender: ctx.sender,
            transaction_id: id,
        });
        if state.is_fully_confirmed(id) {
            execute_pending(host, state, ctx, id)
        } else {
            Ok(ErrorCode::Ok)
        }
    }

    fn set_2fa(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        enable: bool,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if state.use_2fa == enable {
            return Ok(ErrorCode::Ok);
        }
        if enable && state.oracle.is_zero() {
            return Err(Fault::ZeroAddress("oracle"));
        }
        if enable && state.proxy.is_zero() {
            return Err(Fault::ZeroAddress("proxy"));
        }
        submit_or_apply(host, state, ctx, PendingAction::Set2fa(enable))
    }

    fn set_oracle(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        oracle: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if oracle.is_zero() {
            return Err(Fault::ZeroAddress("oracle"));
        }
        submit_or_apply(host, state, ctx, PendingAction::SetOracle(oracle))
    }

    fn set_user_proxy(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        proxy: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if proxy.is_zero() {
            return Err(Fault::ZeroAddress("proxy"));
        }
        submit_or_apply(host, state, ctx, PendingAction::SetUserProxy(proxy))
    }

    fn set_recovery_contract(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        recovery: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if recovery.is_zero() {
            return Err(Fault::ZeroAddress("recovery contract"));
        }
        submit_or_apply(host, state, ctx, PendingAction::SetRecoveryContract(recovery))
    }

    fn add_third_party_owner(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        addr: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if addr.is_zero() {
            return Err(Fault::ZeroAddress("third-party owner"));
        }
        if addr == state.owner || state.is_third_party_owner(addr) {
            return Ok(ErrorCode::Ok);
        }
        submit_or_apply(host, state, ctx, PendingAction::AddThirdPartyOwner(addr))
    }

    fn revoke_third_party_owner(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        addr: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if !state.is_third_party_owner(addr) {
            return Ok(ErrorCode::Ok);
        }
        submit_or_apply(host, state, ctx, PendingAction::RevokeThirdPartyOwner(addr))
    }

    /// Single-step ownership handover. Locked while 2FA is on: the oracle
    /// class must not be silently detached from a new owner's key.
    fn transfer_ownership(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        new_owner: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if new_owner.is_zero() {
            return Err(Fault::ZeroAddress("new owner"));
        }
        if state.use_2fa {
            return Err(Fault::OwnershipLockedBy2fa);
        }
        let old_owner = state.owner;
        state.owner = new_owner;
        state.pending_owner = None;
        host.notify_ownership_changed(old_owner, new_owner)?;
        Ok(ErrorCode::Ok)
    }

    /// First half of the two-phase handover: record the offer.
    fn change_contract_ownership(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        to: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if ctx.sender != state.owner {
            return unauthorized(host);
        }
        if to.is_zero() {
            return Err(Fault::ZeroAddress("pending owner"));
        }
        if state.use_2fa {
            return Err(Fault::OwnershipLockedBy2fa);
        }
        state.pending_owner = Some(to);
        Ok(ErrorCode::Ok)
    }

    /// Second half: the offered party claims.
    fn claim_contract_ownership(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if state.pending_owner != Some(ctx.sender) {
            return unauthorized(host);
        }
        if state.use_2fa {
            return Err(Fault::OwnershipLockedBy2fa);
        }
        let old_owner = state.owner;
        state.owner = ctx.sender;
        state.pending_owner = None;
        host.notify_ownership_changed(old_owner, ctx.sender)?;
        Ok(ErrorCode::Ok)
    }

    /// Recovery bypass: the designated recovery contract replaces the owner
    /// without touching oracle or 2FA settings.
    fn recover_user(
        &self,
        host: &mut Host<'_>,
        state: &mut UserState,
        ctx: CallCtx,
        new_owner: Address,
    ) -> Result<ErrorCode, Fault> {
        ensure_initialized(host, state)?;
        if state.recovery_contract.is_zero() || ctx.sender != state.recovery_contract {
            return unauthorized(host);
        }
        if new_owner.is_zero() {
            return Err(Fault::ZeroAddress("new owner"));
        }
        let old_owner = state.owner;
        state.owner = new_owner;
        state.pending_owner = None;
        host.notify_ownership_changed(old_owner, new_owner)?;
        Ok(ErrorCode::Ok)
    }
}

/// Baseline backend.
#[derive(Debug, Default)]
pub struct BackendV1;

impl UserBackend for BackendV1 {
    fn version(&self) -> u32 {
        1
    }
}

/// Successor version. Behavior is inherited wholesale; what changes is the
/// version number, which makes every account announce the bump on its next
/// call.
#[derive(Debug, Default)]
pub struct BumpedUserBackend;

impl UserBackend for BumpedUserBackend {
    fn version(&self) -> u32 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TableRecoverer;

    struct Fixture {
        env: Env,
        store: KeyedStore,
        proxies: HashMap<Address, UserProxy>,
        targets: HashMap<Address, Box<dyn CallTarget>>,
        recoverer: TableRecoverer,
        state: UserState,
    }

    const USER: u64 = 10;
    const PROXY: u64 = 11;
    const OWNER: u64 = 1;
    const ORACLE: u64 = 6;
    const ISSUER: u64 = 9;
    const RECOVERY: u64 = 7;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn fixture() -> Fixture {
        let mut proxies = HashMap::new();
        proxies.insert(addr(PROXY), UserProxy::new(addr(PROXY), addr(USER)));
        let mut state = UserState::new(addr(OWNER), addr(RECOVERY), addr(8), addr(ISSUER));
        state.proxy = addr(PROXY);
        Fixture {
            env: Env::new(),
            store: KeyedStore::new(),
            proxies,
            targets: HashMap::new(),
            recoverer: TableRecoverer::new(),
            state,
        }
    }

    fn host<'a>(fx: &'a mut Fixture) -> (Host<'a>, &'a mut UserState) {
        (
            Host {
                self_addr: addr(USER),
                env: &mut fx.env,
                store: &mut fx.store,
                proxies: &mut fx.proxies,
                targets: &mut fx.targets,
                recoverer: &fx.recoverer,
                registry: None,
                cashback_enabled: true,
            },
            &mut fx.state,
        )
    }

    fn init(fx: &mut Fixture, enable_2fa: bool) {
        let (mut host, state) = host(fx);
        BackendV1
            .init(&mut host, state, CallCtx::from(addr(ISSUER)), addr(ORACLE), enable_2fa)
            .unwrap();
    }

    #[test]
    fn test_init_is_issuer_only() {
        let mut fx = fixture();
        let (mut h, state) = host(&mut fx);
        let code = BackendV1
            .init(&mut h, state, CallCtx::from(addr(OWNER)), addr(ORACLE), false)
            .unwrap();
        assert_eq!(code, ErrorCode::Unauthorized);
        assert!(!state.initialized);

        let code = BackendV1
            .init(&mut h, state, CallCtx::from(addr(ISSUER)), addr(ORACLE), false)
            .unwrap();
        assert_eq!(code, ErrorCode::Ok);
        assert!(state.initialized);

        let err = BackendV1
            .init(&mut h, state, CallCtx::from(addr(ISSUER)), addr(ORACLE), false)
            .unwrap_err();
        assert!(matches!(err, Fault::AlreadyInitialized(_)));
    }

    #[test]
    fn test_init_rejects_zero_oracle() {
        let mut fx = fixture();
        let (mut h, state) = host(&mut fx);
        let err = BackendV1
            .init(&mut h, state, CallCtx::from(addr(ISSUER)), Address::ZERO, false)
            .unwrap_err();
        assert!(matches!(err, Fault::ZeroAddress("oracle")));
    }

    #[test]
    fn test_owner_forward_without_2fa_is_direct() {
        let mut fx = fixture();
        init(&mut fx, false);
        let (mut h, state) = host(&mut fx);
        let out = BackendV1
            .forward(&mut h, state, CallCtx::from(addr(OWNER)), addr(50), b"x", 0, false)
            .unwrap();
        assert_eq!(out, ForwardOutcome::Executed(Vec::new()));
        assert_eq!(h.env.events.count("Forwarded"), 1);
        assert_eq!(h.env.events.count("Submission"), 0);
    }

    #[test]
    fn test_owner_forward_under_2fa_queues() {
        let mut fx = fixture();
        init(&mut fx, true);
        let (mut h, state) = host(&mut fx);
        let out = BackendV1
            .forward(&mut h, state, CallCtx::from(addr(OWNER)), addr(50), b"x", 0, false)
            .unwrap();
        assert_eq!(out, ForwardOutcome::Queued(1));
        assert_eq!(h.env.events.count("Submission"), 1);
        assert_eq!(h.env.events.count("Confirmation"), 1);
        assert_eq!(h.env.events.count("Forwarded"), 0);
    }

    #[test]
    fn test_third_party_forwards_directly_even_under_2fa() {
        let mut fx = fixture();
        init(&mut fx, true);
        fx.state.third_party_owners.insert(addr(3));
        let (mut h, state) = host(&mut fx);
        let out = BackendV1
            .forward(&mut h, state, CallCtx::from(addr(3)), addr(50), b"x", 0, false)
            .unwrap();
        assert_eq!(out, ForwardOutcome::Executed(Vec::new()));
        assert_eq!(h.env.events.count("Submission"), 0);
        assert_eq!(h.env.events.count("Forwarded"), 1);
    }

    #[test]
    fn test_unrelated_forward_is_denied_with_auth_event() {
        let mut fx = fixture();
        init(&mut fx, false);
        let (mut h, state) = host(&mut fx);
        let out = BackendV1
            .forward(&mut h, state, CallCtx::from(addr(42)), addr(50), b"x", 0, false)
            .unwrap();
        assert_eq!(out, ForwardOutcome::Denied);
        assert_eq!(h.env.events.count("AuthFailedError"), 1);
    }

    #[test]
    fn test_confirm_executes_and_pays_cashback() {
        let mut fx = fixture();
        init(&mut fx, true);
        fx.env.mint(addr(PROXY), 1_000_000_000);
        {
            let (mut h, state) = host(&mut fx);
            BackendV1
                .forward(&mut h, state, CallCtx::from(addr(OWNER)), addr(50), b"x", 5, false)
                .unwrap();
        }
        let relayer_before = fx.env.balance_of(addr(ORACLE));
        let (mut h, state) = host(&mut fx);
        let code = BackendV1
            .confirm_transaction(&mut h, state, CallCtx::from(addr(ORACLE)), 1)
            .unwrap();
        assert_eq!(code, ErrorCode::Ok);
        assert!(state.transactions[&1].executed);
        assert_eq!(h.env.events.count("Execution"), 1);
        assert_eq!(h.env.events.count("Forwarded"), 1);
        // the confirming relayer got refunded out of the proxy
        assert!(h.env.balance_of(addr(ORACLE)) > relayer_before);
    }

    #[test]
    fn test_duplicate_confirmation_is_a_fault() {
        let mut fx = fixture();
        init(&mut fx, true);
        {
            let (mut h, state) = host(&mut fx);
            BackendV1
                .forward(&mut h, state, CallCtx::from(addr(OWNER)), addr(50), b"x", 0, false)
                .unwrap();
        }
        let (mut h, state) = host(&mut fx);
        let err = BackendV1
            .confirm_transaction(&mut h, state, CallCtx::from(addr(OWNER)), 1)
            .unwrap_err();
        assert!(matches!(err, Fault::AlreadyConfirmed(1, _)));

        let err = BackendV1
            .confirm_transaction(&mut h, state, CallCtx::from(addr(99)), 1)
            .unwrap_err();
        assert!(matches!(err, Fault::NotASigner(_)));

        let err = BackendV1
            .confirm_transaction(&mut h, state, CallCtx::from(addr(ORACLE)), 7)
            .unwrap_err();
        assert!(matches!(err, Fault::UnknownTransaction(7)));
    }

    #[test]
    fn test_failed_execution_keeps_tx_pending_and_is_retryable() {
        use crate::account::proxy::MockTarget;

        let mut fx = fixture();
        init(&mut fx, true);
        let mock = MockTarget::failing();
        fx.targets.insert(addr(50), Box::new(mock.clone()));
        {
            let (mut h, state) = host(&mut fx);
            BackendV1
                .forward(&mut h, state, CallCtx::from(addr(OWNER)), addr(50), b"x", 0, false)
                .unwrap();
        }
        {
            let (mut h, state) = host(&mut fx);
            BackendV1
                .confirm_transaction(&mut h, state, CallCtx::from(addr(ORACLE)), 1)
                .unwrap();
            assert!(!state.transactions[&1].executed);
            assert_eq!(h.env.events.count("ExecutionFailure"), 1);
        }

        mock.set_fail(false);
        let (mut h, state) = host(&mut fx);
        BackendV1
            .confirm_transaction(&mut h, state, CallCtx::from(addr(ORACLE)), 1)
            .unwrap();
        assert!(state.transactions[&1].executed);
        assert_eq!(h.env.events.count("Execution"), 1);
    }

    #[test]
    fn test_set_2fa_noop_and_queueing() {
        let mut fx = fixture();
        init(&mut fx, false);
        {
            let (mut h, state) = host(&mut fx);
            // same value: OK, no event
            assert_eq!(
                BackendV1
                    .set_2fa(&mut h, state, CallCtx::from(addr(OWNER)), false)
                    .unwrap(),
                ErrorCode::Ok
            );
            assert_eq!(h.env.events.count("User2FAChanged"), 0);

            assert_eq!(
                BackendV1
                    .set_2fa(&mut h, state, CallCtx::from(addr(OWNER)), true)
                    .unwrap(),
                ErrorCode::Ok
            );
            assert!(state.use_2fa);
            assert_eq!(h.env.events.count("User2FAChanged"), 1);
        }

        // disabling under 2FA needs the oracle's confirmation
        let (mut h, state) = host(&mut fx);
        assert_eq!(
            BackendV1
                .set_2fa(&mut h, state, CallCtx::from(addr(OWNER)), false)
                .unwrap(),
            ErrorCode::MultisigAdded
        );
        assert!(state.use_2fa);
        BackendV1
            .confirm_transaction(&mut h, state, CallCtx::from(addr(ORACLE)), 1)
            .unwrap();
        assert!(!state.use_2fa);
        assert_eq!(h.env.events.count("User2FAChanged"), 2);
    }

    #[test]
    fn test_ownership_transfer_locked_under_2fa() {
        let mut fx = fixture();
        init(&mut fx, true);
        let (mut h, state) = host(&mut fx);
        let err = BackendV1
            .transfer_ownership(&mut h, state, CallCtx::from(addr(OWNER)), addr(2))
            .unwrap_err();
        assert!(matches!(err, Fault::OwnershipLockedBy2fa));
        assert_eq!(state.owner, addr(OWNER));
    }

    #[test]
    fn test_two_phase_ownership_handover() {
        let mut fx = fixture();
        init(&mut fx, false);
        let (mut h, state) = host(&mut fx);
        BackendV1
            .change_contract_ownership(&mut h, state, CallCtx::from(addr(OWNER)), addr(2))
            .unwrap();
        assert_eq!(state.owner, addr(OWNER));

        // only the offered party may claim
        assert_eq!(
            BackendV1
                .claim_contract_ownership(&mut h, state, CallCtx::from(addr(3)))
                .unwrap(),
            ErrorCode::Unauthorized
        );
        assert_eq!(
            BackendV1
                .claim_contract_ownership(&mut h, state, CallCtx::from(addr(2)))
                .unwrap(),
            ErrorCode::Ok
        );
        assert_eq!(state.owner, addr(2));
        assert_eq!(state.pending_owner, None);
    }

    #[test]
    fn test_recover_user_is_recovery_contract_only() {
        let mut fx = fixture();
        init(&mut fx, true);
        let (mut h, state) = host(&mut fx);
        assert_eq!(
            BackendV1
                .recover_user(&mut h, state, CallCtx::from(addr(OWNER)), addr(2))
                .unwrap(),
            ErrorCode::Unauthorized
        );
        assert_eq!(
            BackendV1
                .recover_user(&mut h, state, CallCtx::from(addr(RECOVERY)), addr(2))
                .unwrap(),
            ErrorCode::Ok
        );
        // 2FA settings survive recovery
        assert_eq!(state.owner, addr(2));
        assert!(state.use_2fa);
        assert_eq!(state.oracle, addr(ORACLE));
    }

    #[test]
    fn test_forward_with_vrs_checks_oracle_signature() {
        let mut fx = fixture();
        init(&mut fx, true);
        let message = compose_forward_message(b"pass", addr(OWNER), addr(50), b"x", 0);
        let good = VrsSignature { v: 27, r: [1; 32], s: [2; 32] };
        fx.recoverer.script(message, good, addr(ORACLE));

        let (mut h, state) = host(&mut fx);
        let out = BackendV1
            .forward_with_vrs(
                &mut h, state, CallCtx::from(addr(OWNER)), b"pass", addr(50), b"x", 0, false, &good,
            )
            .unwrap();
        assert_eq!(out, ForwardOutcome::Executed(Vec::new()));
        assert_eq!(h.env.events.count("Forwarded"), 1);
        assert_eq!(h.env.events.count("Submission"), 0);

        // an unscripted signature recovers nobody
        let bad = VrsSignature { v: 27, r: [9; 32], s: [9; 32] };
        let out = BackendV1
            .forward_with_vrs(
                &mut h, state, CallCtx::from(addr(OWNER)), b"pass", addr(50), b"x", 0, false, &bad,
            )
            .unwrap();
        assert_eq!(out, ForwardOutcome::Denied);
    }

    #[test]
    fn test_activation_announces_bump_once() {
        let mut fx = fixture();
        init(&mut fx, false);
        {
            let (mut h, state) = host(&mut fx);
            BackendV1.activate(&mut h, state);
            assert_eq!(state.active_version, 1);
            assert_eq!(h.env.events.count("BumpedUserBackendEvent"), 0);
        }
        let (mut h, state) = host(&mut fx);
        BumpedUserBackend.activate(&mut h, state);
        BumpedUserBackend.activate(&mut h, state);
        assert_eq!(state.active_version, 2);
        assert_eq!(h.env.events.count("BumpedUserBackendEvent"), 1);
    }
}
