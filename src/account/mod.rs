//! Account layer: routers, proxies, versioned backends and their satellites.
//!
//! An account is a pair of addresses. The router is the identity: it holds
//! the canonical state and resolves its logic through a backend provider on
//! every call. The proxy is the wallet: it holds value and performs the
//! outbound calls the router decides on. Around the pair sit the factory
//! that stamps new accounts out, the registry that indexes them by owner,
//! and the recovery coordinator that can replace a lost owner key.

pub mod backend;
pub mod factory;
pub mod provider;
pub mod proxy;
pub mod recovery;
pub mod registry;
pub mod router;
pub mod state;

pub use backend::{BackendV1, BumpedUserBackend, ForwardOutcome, Host, UserBackend};
pub use factory::UserFactory;
pub use provider::BackendProvider;
pub use proxy::{CallTarget, MockTarget, TargetRevert, UserProxy};
pub use recovery::RecoveryCoordinator;
pub use registry::{UserRegistry, REGISTRY_NAMESPACE};
pub use router::UserRouter;
pub use state::{CallerClass, MultisigTx, PendingAction, UserState};
