//! Owner-to-accounts registry behavior through the hub: gated maintenance,
//! automatic indexing on creation, and re-indexing on ownership changes.

use userhub::auth::{selectors, ScriptedGateway};
use userhub::{Address, CallCtx, ErrorCode, Event, Hub};

const OWNER: u64 = 1;
const NEW_OWNER: u64 = 2;
const ORACLE: u64 = 6;
const ADMIN: u64 = 90;
const MODERATOR: u64 = 91;

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

fn ctx(n: u64) -> CallCtx {
    CallCtx::from(addr(n))
}

fn hub_with_registry() -> (Hub, Address, Address) {
    let mut hub = Hub::new();
    let provider = hub.deploy_provider();
    let registry = hub.deploy_registry().unwrap();
    hub.set_user_registry(ctx(ADMIN), provider, registry).unwrap();
    hub.deploy_factory(provider).unwrap();
    hub.set_factory_oracle(ctx(ADMIN), addr(ORACLE)).unwrap();
    hub.set_factory_recovery(ctx(ADMIN), addr(7)).unwrap();
    let (user, _) = hub
        .create_user_with_proxy_and_recovery(ctx(ADMIN), addr(OWNER), false)
        .unwrap();
    (hub, registry, user)
}

#[test]
fn creation_indexes_the_account_under_its_owner() {
    let (hub, _, user) = hub_with_registry();
    assert_eq!(hub.get_user_contracts(addr(OWNER)).unwrap(), vec![user]);
    assert_eq!(hub.events().count("UserContractAdded"), 1);
}

#[test]
fn adding_twice_reports_already_exists() {
    let (mut hub, _, user) = hub_with_registry();
    let code = hub.add_user_contract(ctx(MODERATOR), user).unwrap();
    assert_eq!(code, ErrorCode::UserRegistryUserContractAlreadyExists);
    assert_eq!(hub.get_user_contracts(addr(OWNER)).unwrap().len(), 1);
}

#[test]
fn removal_unindexes_and_second_removal_reports_not_found() {
    let (mut hub, _, user) = hub_with_registry();
    let code = hub
        .remove_user_contract_from(ctx(MODERATOR), user, addr(OWNER))
        .unwrap();
    assert_eq!(code, ErrorCode::Ok);
    assert!(hub.get_user_contracts(addr(OWNER)).unwrap().is_empty());
    assert_eq!(hub.events().count("UserContractRemoved"), 1);

    let code = hub
        .remove_user_contract_from(ctx(MODERATOR), user, addr(OWNER))
        .unwrap();
    assert_eq!(code, ErrorCode::UserRegistryNoUserContractFound);
}

#[test]
fn ownership_transfer_reindexes_through_the_wired_registry() {
    let (mut hub, registry, user) = hub_with_registry();
    hub.transfer_ownership(ctx(OWNER), user, addr(NEW_OWNER)).unwrap();

    assert!(hub.get_user_contracts(addr(OWNER)).unwrap().is_empty());
    assert_eq!(
        hub.get_user_contracts(addr(NEW_OWNER)).unwrap(),
        vec![user]
    );
    let changed: Vec<_> = hub.events().find("UserContractChanged").collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(
        changed[0],
        &Event::UserContractChanged {
            self_: registry,
            user_contract: user,
            old_owner: addr(OWNER),
            owner: addr(NEW_OWNER),
        }
    );
}

#[test]
fn stale_notification_reports_not_found() {
    let (mut hub, _, user) = hub_with_registry();
    // account still belongs to OWNER; a notifier claims it moved away from
    // someone it was never indexed under
    let code = hub
        .user_ownership_changed(ctx(MODERATOR), user, addr(42))
        .unwrap();
    assert_eq!(code, ErrorCode::UserRegistryNoUserContractFound);
    assert_eq!(hub.get_user_contracts(addr(OWNER)).unwrap(), vec![user]);
}

#[test]
fn notification_for_the_current_owner_reports_same_owner() {
    let (mut hub, _, user) = hub_with_registry();
    let code = hub
        .user_ownership_changed(ctx(MODERATOR), user, addr(OWNER))
        .unwrap();
    assert_eq!(code, ErrorCode::UserRegistryCannotChangeToSameOwner);
    assert_eq!(hub.events().count("UserContractChanged"), 0);
}

#[test]
fn maintenance_is_gated_but_notification_is_open() {
    let (mut hub, registry, user) = hub_with_registry();
    let mut gateway = ScriptedGateway::new();
    gateway.expect(
        addr(MODERATOR),
        registry,
        selectors::remove_user_contract_from(),
        false,
    );
    hub.set_gateway(Box::new(gateway));

    let code = hub
        .remove_user_contract_from(ctx(MODERATOR), user, addr(OWNER))
        .unwrap();
    assert_eq!(code, ErrorCode::Unauthorized);
    assert_eq!(hub.get_user_contracts(addr(OWNER)).unwrap(), vec![user]);

    // ownership notifications consult nobody; resolution starves bad input
    hub.transfer_ownership(ctx(OWNER), user, addr(NEW_OWNER)).unwrap();
    assert_eq!(
        hub.get_user_contracts(addr(NEW_OWNER)).unwrap(),
        vec![user]
    );
}

#[test]
fn account_without_registry_wiring_works_silently() {
    let mut hub = Hub::new();
    let provider = hub.deploy_provider();
    hub.deploy_registry().unwrap();
    // registry deployed but never wired into the provider
    hub.deploy_factory(provider).unwrap();
    hub.set_factory_oracle(ctx(ADMIN), addr(ORACLE)).unwrap();
    hub.set_factory_recovery(ctx(ADMIN), addr(7)).unwrap();
    let (user, _) = hub
        .create_user_with_proxy_and_recovery(ctx(ADMIN), addr(OWNER), false)
        .unwrap();

    assert_eq!(hub.events().count("UserContractAdded"), 0);
    hub.transfer_ownership(ctx(OWNER), user, addr(NEW_OWNER)).unwrap();
    assert_eq!(hub.get_user_owner(user).unwrap(), addr(NEW_OWNER));
    assert_eq!(hub.events().count("UserContractChanged"), 0);
}
