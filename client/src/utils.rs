use serde::{Deserialize, Serialize};

use crate::{
    error::{DexError, DexResult},
    state::Side,
};

/// How native amounts that are not a whole number of lots are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Reject any amount that leaves a remainder
    Exact,
    /// Round every amount toward zero
    Truncate,
    /// Round prices away from crossing the spread (bids down, asks up) and quantities down
    Conservative,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        RoundingPolicy::Exact
    }
}

fn lots(
    what: &'static str,
    value: u64,
    lot_size: u64,
    round_up: bool,
    policy: RoundingPolicy,
) -> DexResult<u64> {
    let invalid = DexError::InvalidSize {
        what,
        value,
        lot_size,
    };
    if lot_size == 0 {
        return Err(invalid);
    }
    let quotient = value / lot_size;
    let remainder = value % lot_size;
    let result = match (remainder, policy) {
        (0, _) => quotient,
        (_, RoundingPolicy::Exact) => return Err(invalid),
        (_, RoundingPolicy::Truncate) => quotient,
        (_, RoundingPolicy::Conservative) if round_up => {
            quotient.checked_add(1).ok_or_else(|| invalid.clone())?
        }
        (_, RoundingPolicy::Conservative) => quotient,
    };
    if result == 0 {
        return Err(invalid);
    }
    Ok(result)
}

/// Convert a native limit price into quote lots. Zero lots is rejected.
pub fn price_to_lots(
    limit_price: u64,
    quote_lot_size: u64,
    side: Side,
    policy: RoundingPolicy,
) -> DexResult<u64> {
    lots(
        "limit price",
        limit_price,
        quote_lot_size,
        side == Side::Ask,
        policy,
    )
}

/// Convert a native quantity into base lots. Zero lots is rejected.
pub fn quantity_to_lots(quantity: u64, base_lot_size: u64, policy: RoundingPolicy) -> DexResult<u64> {
    lots("quantity", quantity, base_lot_size, false, policy)
}

/// Native value of `lots` lots, or `None` on overflow
pub fn lots_to_native(lots: u64, lot_size: u64) -> Option<u64> {
    lots.checked_mul(lot_size)
}
