//! Identity and access-delegation layer: upgradeable user accounts behind
//! stable addresses.
//!
//! Each account is a router/proxy address pair. The proxy holds value and
//! makes the outbound calls; the router holds the canonical state and pulls
//! its logic from whatever backend version its provider currently serves,
//! so accounts upgrade without moving. On top of the pair sit class-based
//! 2-of-2 multisig (owner plus oracle), forward-only third-party owners, a
//! recovery bypass for lost keys, an owner-to-accounts registry, and gas
//! cashback that reimburses relayers out of the account's own balance.
//!
//! [`hub::Hub`] wires everything together and is the place to start.

pub mod account;
pub mod auth;
pub mod crypto;
pub mod env;
pub mod error;
pub mod events;
pub mod gas;
pub mod hub;
pub mod storage;
pub mod types;

pub use account::{BackendV1, BumpedUserBackend, ForwardOutcome, UserBackend};
pub use auth::{AuthorizationGateway, Selector};
pub use crypto::{SignatureRecoverer, VrsSignature};
pub use env::CallCtx;
pub use error::{ErrorCode, Fault};
pub use events::Event;
pub use hub::{GasReceipt, Hub};
pub use types::{Address, TxId, Value};
