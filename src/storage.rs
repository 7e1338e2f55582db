//! Shared keyed storage with per-writer capability grants.
//!
//! Several components persist through one store, each under a namespace it
//! has been granted by the store manager. Access is checked on every read and
//! write and fails closed: no grant, no data. Values go through bincode, and
//! every write bumps a per-key version counter.
//!
//! The journal records the previous value of every write so the hub can wind
//! a whole call back when it aborts.

use crate::error::Fault;
use crate::types::Address;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

type SlotKey = (String, String);

#[derive(Debug, Default)]
pub struct KeyedStore {
    manager: Option<Address>,
    grants: HashMap<String, HashSet<Address>>,
    data: HashMap<SlotKey, Vec<u8>>,
    versions: HashMap<SlotKey, u64>,
    journal: Vec<JournalEntry>,
}

#[derive(Debug)]
struct JournalEntry {
    slot: SlotKey,
    prev: Option<Vec<u8>>,
    prev_version: u64,
}

/// Opaque checkpoint handle, valid until the next `rollback`/`commit`.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint(usize);

impl KeyedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the manager. Only the manager may hand out grants; the first
    /// installation is open, later changes require the current manager.
    pub fn set_manager(&mut self, by: Address, manager: Address) -> Result<(), Fault> {
        if manager.is_zero() {
            return Err(Fault::ZeroAddress("storage manager"));
        }
        if let Some(current) = self.manager {
            if by != current {
                return Err(Fault::StorageAccessDenied {
                    writer: by,
                    namespace: "<manager>".into(),
                });
            }
        }
        self.manager = Some(manager);
        Ok(())
    }

    /// Grant `contract` read/write access to `namespace`.
    pub fn give_access(
        &mut self,
        by: Address,
        contract: Address,
        namespace: &str,
    ) -> Result<(), Fault> {
        if self.manager != Some(by) {
            return Err(Fault::StorageAccessDenied {
                writer: by,
                namespace: namespace.to_string(),
            });
        }
        debug!(%contract, namespace, "storage access granted");
        self.grants
            .entry(namespace.to_string())
            .or_default()
            .insert(contract);
        Ok(())
    }

    pub fn has_access(&self, contract: Address, namespace: &str) -> bool {
        self.grants
            .get(namespace)
            .map(|g| g.contains(&contract))
            .unwrap_or(false)
    }

    fn check_access(&self, contract: Address, namespace: &str) -> Result<(), Fault> {
        if self.has_access(contract, namespace) {
            Ok(())
        } else {
            Err(Fault::StorageAccessDenied {
                writer: contract,
                namespace: namespace.to_string(),
            })
        }
    }

    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        writer: Address,
        namespace: &str,
        key: &str,
        value: &T,
    ) -> Result<(), Fault> {
        self.check_access(writer, namespace)?;
        let slot = (namespace.to_string(), key.to_string());
        let encoded = bincode::serialize(value).map_err(|e| Fault::StorageCodec(e.to_string()))?;
        let version = self.versions.get(&slot).copied().unwrap_or(0);
        self.journal.push(JournalEntry {
            slot: slot.clone(),
            prev: self.data.get(&slot).cloned(),
            prev_version: version,
        });
        self.versions.insert(slot.clone(), version + 1);
        self.data.insert(slot, encoded);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        reader: Address,
        namespace: &str,
        key: &str,
    ) -> Result<Option<T>, Fault> {
        self.check_access(reader, namespace)?;
        let slot = (namespace.to_string(), key.to_string());
        match self.data.get(&slot) {
            Some(bytes) => bincode::deserialize(bytes)
                .map(Some)
                .map_err(|e| Fault::StorageCodec(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn remove(&mut self, writer: Address, namespace: &str, key: &str) -> Result<(), Fault> {
        self.check_access(writer, namespace)?;
        let slot = (namespace.to_string(), key.to_string());
        let version = self.versions.get(&slot).copied().unwrap_or(0);
        self.journal.push(JournalEntry {
            slot: slot.clone(),
            prev: self.data.get(&slot).cloned(),
            prev_version: version,
        });
        self.versions.insert(slot.clone(), version + 1);
        self.data.remove(&slot);
        Ok(())
    }

    /// Version of a key: 0 if never written, bumped on every write/remove.
    pub fn version_of(&self, namespace: &str, key: &str) -> u64 {
        self.versions
            .get(&(namespace.to_string(), key.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Undo every write made after the checkpoint, newest first.
    pub fn rollback(&mut self, mark: Checkpoint) {
        while self.journal.len() > mark.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry.prev {
                Some(bytes) => {
                    self.data.insert(entry.slot.clone(), bytes);
                }
                None => {
                    self.data.remove(&entry.slot);
                }
            }
            if entry.prev_version == 0 {
                self.versions.remove(&entry.slot);
            } else {
                self.versions.insert(entry.slot, entry.prev_version);
            }
        }
    }

    /// Forget journal entries up to the checkpoint; they can no longer be
    /// rolled back.
    pub fn commit(&mut self, mark: Checkpoint) {
        let keep = self.journal.split_off(mark.0.min(self.journal.len()));
        self.journal = keep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_grant(contract: Address, ns: &str) -> KeyedStore {
        let manager = Address::from_low_u64(99);
        let mut store = KeyedStore::new();
        store.set_manager(manager, manager).unwrap();
        store.give_access(manager, contract, ns).unwrap();
        store
    }

    #[test]
    fn test_access_fails_closed() {
        let contract = Address::from_low_u64(1);
        let stranger = Address::from_low_u64(2);
        let mut store = store_with_grant(contract, "Registry");

        store.set(contract, "Registry", "k", &42u64).unwrap();
        assert!(matches!(
            store.set(stranger, "Registry", "k", &1u64),
            Err(Fault::StorageAccessDenied { .. })
        ));
        assert!(matches!(
            store.get::<u64>(stranger, "Registry", "k"),
            Err(Fault::StorageAccessDenied { .. })
        ));
        // a grant is per namespace
        assert!(matches!(
            store.set(contract, "Other", "k", &1u64),
            Err(Fault::StorageAccessDenied { .. })
        ));
    }

    #[test]
    fn test_versions_bump_on_write() {
        let contract = Address::from_low_u64(1);
        let mut store = store_with_grant(contract, "ns");

        assert_eq!(store.version_of("ns", "k"), 0);
        store.set(contract, "ns", "k", &1u64).unwrap();
        store.set(contract, "ns", "k", &2u64).unwrap();
        assert_eq!(store.version_of("ns", "k"), 2);
        assert_eq!(store.get::<u64>(contract, "ns", "k").unwrap(), Some(2));
    }

    #[test]
    fn test_rollback_restores_previous_values() {
        let contract = Address::from_low_u64(1);
        let mut store = store_with_grant(contract, "ns");
        store.set(contract, "ns", "a", &1u64).unwrap();

        let mark = store.checkpoint();
        store.set(contract, "ns", "a", &2u64).unwrap();
        store.set(contract, "ns", "b", &3u64).unwrap();
        store.remove(contract, "ns", "a").unwrap();

        store.rollback(mark);
        assert_eq!(store.get::<u64>(contract, "ns", "a").unwrap(), Some(1));
        assert_eq!(store.get::<u64>(contract, "ns", "b").unwrap(), None);
        assert_eq!(store.version_of("ns", "a"), 1);
        assert_eq!(store.version_of("ns", "b"), 0);
    }

    #[test]
    fn test_only_manager_grants() {
        let manager = Address::from_low_u64(99);
        let intruder = Address::from_low_u64(3);
        let mut store = KeyedStore::new();
        store.set_manager(manager, manager).unwrap();
        assert!(store
            .give_access(intruder, intruder, "ns")
            .is_err());
        assert!(store.set_manager(intruder, intruder).is_err());
    }
}
