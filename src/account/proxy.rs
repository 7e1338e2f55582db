//! Value-holding proxy in front of an account router.
//!
//! The proxy is the stable address the outside world interacts with: it holds
//! the native balance and performs the actual outbound calls. Only its router
//! may drive it; anyone else gets a zeroed reply rather than a fault, so a
//! probing caller learns nothing and burns no queued state.

use crate::env::Env;
use crate::error::Fault;
use crate::events::Event;
use crate::gas::{CALL_GAS, CALL_VALUE_GAS};
use crate::types::{Address, Value};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Marker for a destination that rejected the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRevert;

/// An external destination the proxy can call into. Destinations with no
/// registered target behave like plain value recipients.
pub trait CallTarget {
    fn call(&mut self, from: Address, value: Value, data: &[u8]) -> Result<Vec<u8>, TargetRevert>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserProxy {
    pub address: Address,
    /// The router allowed to forward through this proxy.
    pub user: Address,
}

impl UserProxy {
    pub fn new(address: Address, user: Address) -> Self {
        Self { address, user }
    }

    /// Forward `(destination, value, data)` on behalf of the router.
    ///
    /// Callers other than the owning router get `Ok(None)` back, the zeroed
    /// reply. A failed destination call yields `Ok(None)` as well, unless
    /// `throw_on_failed_call` turns it into a fault. `Forwarded` is emitted
    /// on success only.
    pub fn forward(
        &self,
        env: &mut Env,
        targets: &mut HashMap<Address, Box<dyn CallTarget>>,
        caller: Address,
        destination: Address,
        data: &[u8],
        value: Value,
        throw_on_failed_call: bool,
    ) -> Result<Option<Vec<u8>>, Fault> {
        if caller != self.user {
            debug!(%caller, proxy = %self.address, "forward by non-owner ignored");
            return Ok(None);
        }

        env.meter.charge(CALL_GAS);
        env.meter.charge_calldata(data);
        if value > 0 {
            env.meter.charge(CALL_VALUE_GAS);
            if env.balance_of(self.address) < value {
                return self.failed(destination, throw_on_failed_call);
            }
        }

        let output = match targets.get_mut(&destination) {
            Some(target) => match target.call(self.address, value, data) {
                Ok(output) => output,
                Err(TargetRevert) => return self.failed(destination, throw_on_failed_call),
            },
            None => Vec::new(),
        };

        if value > 0 {
            env.transfer(self.address, destination, value)?;
        }
        env.emit(Event::Forwarded {
            destination,
            value,
            data: data.to_vec(),
        });
        Ok(Some(output))
    }

    fn failed(
        &self,
        destination: Address,
        throw_on_failed_call: bool,
    ) -> Result<Option<Vec<u8>>, Fault> {
        if throw_on_failed_call {
            Err(Fault::ForwardedCallFailed(destination))
        } else {
            Ok(None)
        }
    }

    /// Accept a plain value transfer into the proxy.
    pub fn receive_value(
        &self,
        env: &mut Env,
        sender: Address,
        value: Value,
    ) -> Result<(), Fault> {
        env.transfer(sender, self.address, value)?;
        env.emit(Event::Received { sender, value });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockTargetInner {
    fail: bool,
    response: Vec<u8>,
    calls: Vec<(Address, Value, Vec<u8>)>,
}

/// Scripted destination for tests. Clones share state, so a suite can hand
/// one clone to the runtime and keep another to inspect recorded calls.
#[derive(Debug, Clone, Default)]
pub struct MockTarget {
    inner: Rc<RefCell<MockTargetInner>>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: Vec<u8>) -> Self {
        let target = Self::new();
        target.inner.borrow_mut().response = response;
        target
    }

    pub fn failing() -> Self {
        let target = Self::new();
        target.inner.borrow_mut().fail = true;
        target
    }

    pub fn set_fail(&self, fail: bool) {
        self.inner.borrow_mut().fail = fail;
    }

    pub fn calls(&self) -> Vec<(Address, Value, Vec<u8>)> {
        self.inner.borrow().calls.clone()
    }

    pub fn calls_count(&self) -> usize {
        self.inner.borrow().calls.len()
    }
}

impl CallTarget for MockTarget {
    fn call(&mut self, from: Address, value: Value, data: &[u8]) -> Result<Vec<u8>, TargetRevert> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push((from, value, data.to_vec()));
        if inner.fail {
            Err(TargetRevert)
        } else {
            Ok(inner.response.clone())
        }
    }
}
