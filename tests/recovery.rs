//! Recovery coordinator flows: gated owner replacement that bypasses 2FA
//! and leaves the account's security settings intact.

use userhub::auth::{selectors, ScriptedGateway};
use userhub::{Address, CallCtx, ErrorCode, Event, Fault, Hub};

const OWNER: u64 = 1;
const NEW_OWNER: u64 = 2;
const ORACLE: u64 = 6;
const ADMIN: u64 = 90;
const KEY_HOLDER: u64 = 92;

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

fn ctx(n: u64) -> CallCtx {
    CallCtx::from(addr(n))
}

fn hub_with_recovery(use_2fa: bool) -> (Hub, Address, Address) {
    let mut hub = Hub::new();
    let provider = hub.deploy_provider();
    hub.deploy_factory(provider).unwrap();
    let coordinator = hub.deploy_recovery();
    hub.set_factory_oracle(ctx(ADMIN), addr(ORACLE)).unwrap();
    hub.set_factory_recovery(ctx(ADMIN), coordinator).unwrap();
    let (user, _) = hub
        .create_user_with_proxy_and_recovery(ctx(ADMIN), addr(OWNER), use_2fa)
        .unwrap();
    (hub, coordinator, user)
}

#[test]
fn recovery_replaces_the_owner_and_keeps_2fa_settings() {
    let (mut hub, _, user) = hub_with_recovery(true);
    let code = hub.recover_user(ctx(KEY_HOLDER), user, addr(NEW_OWNER)).unwrap();
    assert_eq!(code, ErrorCode::Ok);
    assert_eq!(hub.get_user_owner(user).unwrap(), addr(NEW_OWNER));
    assert!(hub.get_use_2fa(user).unwrap());
    assert_eq!(hub.get_oracle(user).unwrap(), addr(ORACLE));

    let recovered: Vec<_> = hub.events().find("UserRecovered").collect();
    assert_eq!(recovered.len(), 1);
    assert_eq!(
        recovered[0],
        &Event::UserRecovered {
            user_contract: user,
            prev_user: addr(OWNER),
            new_user: addr(NEW_OWNER),
        }
    );
}

#[test]
fn recovery_authorization_is_checked_at_the_coordinator() {
    let (mut hub, coordinator, user) = hub_with_recovery(false);
    let mut gateway = ScriptedGateway::new();
    gateway.expect(addr(KEY_HOLDER), coordinator, selectors::recover_user(), true);
    hub.set_gateway(Box::new(gateway));

    let code = hub.recover_user(ctx(KEY_HOLDER), user, addr(NEW_OWNER)).unwrap();
    assert_eq!(code, ErrorCode::Ok);

    // second attempt has no scripted grant left
    let code = hub.recover_user(ctx(KEY_HOLDER), user, addr(OWNER)).unwrap();
    assert_eq!(code, ErrorCode::Unauthorized);
    assert_eq!(hub.get_user_owner(user).unwrap(), addr(NEW_OWNER));
}

#[test]
fn recovery_the_account_refuses_aborts_the_call() {
    let mut hub = Hub::new();
    let provider = hub.deploy_provider();
    hub.deploy_factory(provider).unwrap();
    hub.set_factory_oracle(ctx(ADMIN), addr(ORACLE)).unwrap();
    // the account trusts a different recovery contract than the coordinator
    hub.set_factory_recovery(ctx(ADMIN), addr(77)).unwrap();
    let (user, _) = hub
        .create_user_with_proxy_and_recovery(ctx(ADMIN), addr(OWNER), false)
        .unwrap();
    hub.deploy_recovery();

    let err = hub.recover_user(ctx(KEY_HOLDER), user, addr(NEW_OWNER)).unwrap_err();
    assert!(matches!(err, Fault::RecoveryFailed(u) if u == user));
    assert_eq!(hub.get_user_owner(user).unwrap(), addr(OWNER));
    assert_eq!(hub.events().count("UserRecovered"), 0);
}

#[test]
fn recovery_to_the_zero_address_faults() {
    let (mut hub, _, user) = hub_with_recovery(false);
    let err = hub.recover_user(ctx(KEY_HOLDER), user, Address::ZERO).unwrap_err();
    assert!(matches!(err, Fault::ZeroAddress("new owner")));
    assert_eq!(hub.get_user_owner(user).unwrap(), addr(OWNER));
}

#[test]
fn recovered_account_reindexes_when_a_registry_is_wired() {
    let mut hub = Hub::new();
    let provider = hub.deploy_provider();
    let registry = hub.deploy_registry().unwrap();
    hub.set_user_registry(ctx(ADMIN), provider, registry).unwrap();
    hub.deploy_factory(provider).unwrap();
    let coordinator = hub.deploy_recovery();
    hub.set_factory_oracle(ctx(ADMIN), addr(ORACLE)).unwrap();
    hub.set_factory_recovery(ctx(ADMIN), coordinator).unwrap();
    let (user, _) = hub
        .create_user_with_proxy_and_recovery(ctx(ADMIN), addr(OWNER), true)
        .unwrap();

    hub.recover_user(ctx(KEY_HOLDER), user, addr(NEW_OWNER)).unwrap();
    assert!(hub.get_user_contracts(addr(OWNER)).unwrap().is_empty());
    assert_eq!(
        hub.get_user_contracts(addr(NEW_OWNER)).unwrap(),
        vec![user]
    );
}
