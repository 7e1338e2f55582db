//! Gas cost model and per-call meter.
//!
//! The account system pays its own relayer back out of the proxy balance, so
//! the meter and the cashback estimator must share one cost model: whatever
//! the meter charges during a call is exactly what the estimator sees when it
//! prices the refund. The constants below define that model for this
//! substrate; calldata pricing keeps the zero/non-zero byte split so the
//! estimator stays proportional to real payload shape.

use serde::{Deserialize, Serialize};

/// Flat cost charged for every top-level call.
pub const TX_BASE_GAS: u64 = 21_000;
/// Per zero byte of calldata.
pub const ZERO_BYTE_GAS: u64 = 4;
/// Per non-zero byte of calldata.
pub const NONZERO_BYTE_GAS: u64 = 68;
/// Reading one persisted slot.
pub const SLOAD_GAS: u64 = 200;
/// Writing one persisted slot.
pub const SSTORE_GAS: u64 = 5_000;
/// Emitting one event.
pub const LOG_GAS: u64 = 1_125;
/// Making an external call.
pub const CALL_GAS: u64 = 700;
/// Surcharge for a value-bearing external call.
pub const CALL_VALUE_GAS: u64 = 9_000;

/// Everything the cashback path still has to pay for after it has read the
/// meter: the refund transfer itself plus the two balance writes.
pub const CASHBACK_TAIL_GAS: u64 = CALL_GAS + CALL_VALUE_GAS + 2 * SSTORE_GAS;
/// Safety margin the estimator adds on top of the tail. This is the exact
/// per-call overpayment, and it must stay within the 200-gas envelope the
/// cashback contract promises relayers.
pub const CASHBACK_PAD_GAS: u64 = 64;

/// Calldata cost of a payload, priced per byte class.
pub fn calldata_gas(data: &[u8]) -> u64 {
    data.iter()
        .map(|b| {
            if *b == 0 {
                ZERO_BYTE_GAS
            } else {
                NONZERO_BYTE_GAS
            }
        })
        .sum()
}

/// Accumulates the cost of the call currently executing.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GasMeter {
    spent: u64,
}

impl GasMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh top-level call.
    pub fn reset(&mut self) {
        self.spent = 0;
    }

    pub fn charge(&mut self, gas: u64) {
        self.spent = self.spent.saturating_add(gas);
    }

    pub fn charge_calldata(&mut self, data: &[u8]) {
        self.charge(calldata_gas(data));
    }

    pub fn spent(&self) -> u64 {
        self.spent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calldata_gas_splits_byte_classes() {
        // 2 zero bytes + 3 non-zero bytes
        let data = [0u8, 7, 0, 255, 1];
        assert_eq!(calldata_gas(&data), 2 * ZERO_BYTE_GAS + 3 * NONZERO_BYTE_GAS);
        assert_eq!(calldata_gas(&[]), 0);
    }

    #[test]
    fn test_meter_accumulates_and_resets() {
        let mut meter = GasMeter::new();
        meter.charge(TX_BASE_GAS);
        meter.charge_calldata(&[1, 2, 3]);
        assert_eq!(meter.spent(), TX_BASE_GAS + 3 * NONZERO_BYTE_GAS);
        meter.reset();
        assert_eq!(meter.spent(), 0);
    }

    #[test]
    fn test_cashback_pad_is_inside_promised_envelope() {
        assert!(CASHBACK_PAD_GAS <= 200);
    }
}
