//! Event surface of the account system.
//!
//! The variant set and field names mirror the external interface exactly:
//! observers (indexers, relayers, the test suites) match on them by name.

use crate::error::ErrorCode;
use crate::types::{Address, TxId, Value};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UserCreated {
        user: Address,
        proxy: Address,
        recovery_contract: Address,
        owner: Address,
    },
    UserContractAdded {
        self_: Address,
        user_contract: Address,
        owner: Address,
    },
    UserContractRemoved {
        self_: Address,
        user_contract: Address,
        owner: Address,
    },
    UserContractChanged {
        self_: Address,
        user_contract: Address,
        old_owner: Address,
        owner: Address,
    },
    Submission {
        transaction_id: TxId,
    },
    Confirmation {
        sender: Address,
        transaction_id: TxId,
    },
    Execution {
        transaction_id: TxId,
    },
    ExecutionFailure {
        transaction_id: TxId,
    },
    Forwarded {
        destination: Address,
        value: Value,
        data: Vec<u8>,
    },
    Received {
        sender: Address,
        value: Value,
    },
    User2FAChanged {
        self_: Address,
        initiator: Address,
        user: Address,
        proxy: Address,
        enabled: bool,
    },
    OwnerAddition {
        owner: Address,
    },
    OwnerRemoval {
        owner: Address,
    },
    BumpedUserBackendEvent {
        user: Address,
        version: u32,
    },
    AuthFailedError {
        self_: Address,
        caller: Address,
        sig: [u8; 4],
    },
    ErrorCode {
        error_code: ErrorCode,
    },
    UserRecovered {
        user_contract: Address,
        prev_user: Address,
        new_user: Address,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserCreated { .. } => "UserCreated",
            Event::UserContractAdded { .. } => "UserContractAdded",
            Event::UserContractRemoved { .. } => "UserContractRemoved",
            Event::UserContractChanged { .. } => "UserContractChanged",
            Event::Submission { .. } => "Submission",
            Event::Confirmation { .. } => "Confirmation",
            Event::Execution { .. } => "Execution",
            Event::ExecutionFailure { .. } => "ExecutionFailure",
            Event::Forwarded { .. } => "Forwarded",
            Event::Received { .. } => "Received",
            Event::User2FAChanged { .. } => "User2FAChanged",
            Event::OwnerAddition { .. } => "OwnerAddition",
            Event::OwnerRemoval { .. } => "OwnerRemoval",
            Event::BumpedUserBackendEvent { .. } => "BumpedUserBackendEvent",
            Event::AuthFailedError { .. } => "AuthFailedError",
            Event::ErrorCode { .. } => "ErrorCode",
            Event::UserRecovered { .. } => "UserRecovered",
        }
    }
}

/// Append-only event log kept by the execution environment.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.entries.push(event);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all(&self) -> &[Event] {
        &self.entries
    }

    /// Events appended after a previously taken `len()` mark.
    pub fn since(&self, mark: usize) -> &[Event] {
        &self.entries[mark..]
    }

    pub fn find<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Event> {
        let name = name.to_string();
        self.entries.iter().filter(move |e| e.name() == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|e| e.name() == name).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_since_and_count() {
        let mut log = EventLog::new();
        log.push(Event::Submission { transaction_id: 1 });
        let mark = log.len();
        log.push(Event::Execution { transaction_id: 1 });
        log.push(Event::Execution { transaction_id: 2 });

        assert_eq!(log.since(mark).len(), 2);
        assert_eq!(log.count("Execution"), 2);
        assert_eq!(log.count("Confirmation"), 0);
    }
}
