//! Execution environment: call context, balances, events and metering.
//!
//! The platform serializes operations one at a time; everything mutable that
//! an operation can touch lives either here or in the keyed store, which is
//! what lets the hub snapshot and roll the whole world back on a fault.

use crate::error::Fault;
use crate::events::{Event, EventLog};
use crate::gas::{GasMeter, LOG_GAS};
use crate::types::{Address, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Per-call context: who calls, how much native value rides along, and the
/// gas price the relayer paid (used by the cashback estimator).
#[derive(Debug, Clone, Copy)]
pub struct CallCtx {
    pub sender: Address,
    pub value: Value,
    pub gas_price: Value,
}

impl CallCtx {
    pub fn from(sender: Address) -> Self {
        Self {
            sender,
            value: 0,
            gas_price: 1,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_price(mut self, gas_price: Value) -> Self {
        self.gas_price = gas_price;
        self
    }
}

/// Mutable world state that is not component-owned: native balances, the
/// event log and the gas meter of the call in flight.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Env {
    balances: HashMap<Address, Value>,
    pub events: EventLog,
    pub meter: GasMeter,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, addr: Address) -> Value {
        self.balances.get(&addr).copied().unwrap_or(0)
    }

    /// Credit an address out of thin air. Test funding and genesis only.
    pub fn mint(&mut self, addr: Address, value: Value) {
        *self.balances.entry(addr).or_insert(0) += value;
    }

    /// Move native value between addresses. Fails (fault) on insufficient
    /// balance; callers that must not fail use `try_transfer`.
    pub fn transfer(&mut self, from: Address, to: Address, value: Value) -> Result<(), Fault> {
        if value == 0 {
            return Ok(());
        }
        let have = self.balance_of(from);
        if have < value {
            return Err(Fault::InsufficientBalance {
                from,
                need: value,
                have,
            });
        }
        self.balances.insert(from, have - value);
        *self.balances.entry(to).or_insert(0) += value;
        Ok(())
    }

    /// Transfer that swallows failure. Returns whether the value moved.
    pub fn try_transfer(&mut self, from: Address, to: Address, value: Value) -> bool {
        match self.transfer(from, to, value) {
            Ok(()) => true,
            Err(fault) => {
                warn!(%from, %to, value, %fault, "value transfer skipped");
                false
            }
        }
    }

    /// Emit an event, charging the log cost.
    pub fn emit(&mut self, event: Event) {
        self.meter.charge(LOG_GAS);
        self.events.push(event);
    }
}
