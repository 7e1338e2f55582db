//! Signed-forward message composition and the signature-recovery seam.
//!
//! Recovery of a signer address from a `(v, r, s)` triple is a trusted
//! external primitive with a defined contract: given the 32-byte message
//! digest and the triple, it either names an address or nothing. The crate
//! ships two implementations: an ed25519-backed one that resolves the
//! signer by verifying against a table of registered keys, and a scripted
//! table for tests that need full control over the answer.

use crate::types::{Address, Value};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Raw signature triple as supplied by the off-chain signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrsSignature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl VrsSignature {
    fn signature_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }
}

/// Deterministic digest binding a pass-nonce, the declared sender and the
/// full forwarded call. Any party that recomposes it with a different field
/// gets a different digest, which is what makes the tamper checks fall out
/// of signature verification alone.
pub fn compose_forward_message(
    pass: &[u8],
    sender: Address,
    destination: Address,
    data: &[u8],
    value: Value,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pass);
    hasher.update(sender.as_bytes());
    hasher.update(destination.as_bytes());
    hasher.update(data);
    hasher.update(value.to_be_bytes());
    hasher.finalize().into()
}

/// The trusted recovery primitive.
pub trait SignatureRecoverer {
    /// Recover the signer of `message` from the triple, or `None` when the
    /// signature matches no known signer.
    fn recover(&self, message: &[u8; 32], signature: &VrsSignature) -> Option<Address>;
}

/// Ed25519-backed recoverer: `(r, s)` carry the 64-byte signature and the
/// signer is whichever registered key verifies it.
#[derive(Default)]
pub struct KeyTableRecoverer {
    keys: HashMap<Address, VerifyingKey>,
}

impl KeyTableRecoverer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, addr: Address, key: VerifyingKey) {
        self.keys.insert(addr, key);
    }
}

impl SignatureRecoverer for KeyTableRecoverer {
    fn recover(&self, message: &[u8; 32], signature: &VrsSignature) -> Option<Address> {
        let sig = Signature::from_bytes(&signature.signature_bytes());
        self.keys
            .iter()
            .find(|(_, key)| key.verify(message, &sig).is_ok())
            .map(|(addr, _)| *addr)
    }
}

/// Scripted recoverer: answers from a fixed table keyed by digest and
/// triple. Lets a test hand out any signer it likes.
#[derive(Default)]
pub struct TableRecoverer {
    answers: HashMap<([u8; 32], [u8; 64]), Address>,
}

impl TableRecoverer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&mut self, message: [u8; 32], signature: VrsSignature, signer: Address) {
        self.answers
            .insert((message, signature.signature_bytes()), signer);
    }
}

impl SignatureRecoverer for TableRecoverer {
    fn recover(&self, message: &[u8; 32], signature: &VrsSignature) -> Option<Address> {
        self.answers
            .get(&(*message, signature.signature_bytes()))
            .copied()
    }
}

/// Keypair helper for components (and tests) that produce oracle signatures.
pub struct OracleKey {
    signing: SigningKey,
}

impl OracleKey {
    /// Generate a fresh Ed25519 keypair.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing: SigningKey::generate(&mut csprng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Sign a forward-message digest into the wire triple.
    pub fn sign(&self, message: &[u8; 32]) -> VrsSignature {
        let sig = self.signing.sign(message);
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        VrsSignature { v: 27, r, s }
    }
}
