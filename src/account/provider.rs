//! Backend provider: the indirection every router resolves its logic through.
//!
//! Routers store a provider address, not a backend version, so pointing the
//! provider at a new current version upgrades every account behind it in one
//! move. The provider also carries the wiring that is policy rather than
//! per-account state: which registry to notify and whether cashback is on.

use crate::error::Fault;
use crate::types::Address;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::backend::UserBackend;

#[derive(Clone)]
pub struct BackendProvider {
    pub address: Address,
    backends: BTreeMap<u32, Arc<dyn UserBackend>>,
    current: u32,
    pub user_registry: Option<Address>,
    pub use_cashback: bool,
}

impl BackendProvider {
    pub fn new(address: Address, backend: Arc<dyn UserBackend>) -> Self {
        let current = backend.version();
        let mut backends = BTreeMap::new();
        backends.insert(current, backend);
        Self {
            address,
            backends,
            current,
            user_registry: None,
            use_cashback: true,
        }
    }

    /// Register a backend under its version. Does not change the current
    /// version; that is a separate, gated step.
    pub fn register_backend(&mut self, backend: Arc<dyn UserBackend>) {
        self.backends.insert(backend.version(), backend);
    }

    pub fn set_current(&mut self, version: u32) -> Result<(), Fault> {
        if !self.backends.contains_key(&version) {
            return Err(Fault::UnknownBackendVersion(version));
        }
        info!(provider = %self.address, version, "current backend version changed");
        self.current = version;
        Ok(())
    }

    pub fn current_version(&self) -> u32 {
        self.current
    }

    /// The backend routers resolve right now.
    pub fn backend(&self) -> Arc<dyn UserBackend> {
        // current always names a registered version
        Arc::clone(&self.backends[&self.current])
    }

    pub fn backend_for(&self, version: u32) -> Result<Arc<dyn UserBackend>, Fault> {
        self.backends
            .get(&version)
            .map(Arc::clone)
            .ok_or(Fault::UnknownBackendVersion(version))
    }
}
