//! Core identifier types shared across the account system

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of a queued multisig transaction. Monotonic per account,
/// never reused.
pub type TxId = u64;

/// Native value amount (smallest unit).
pub type Value = u128;

/// 20-byte account/contract address.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Deterministically derive an address from a domain tag and an index.
    /// Used by the hub when allocating fresh router/proxy addresses.
    pub fn derive(tag: &str, index: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tag.as_bytes());
        hasher.update(index.to_be_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[..20]);
        Address(out)
    }

    /// Shorthand for fixed test/fixture addresses.
    pub fn from_low_u64(n: u64) -> Self {
        let mut out = [0u8; 20];
        out[12..].copy_from_slice(&n.to_be_bytes());
        Address(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
