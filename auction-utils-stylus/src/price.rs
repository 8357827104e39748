//! Linear descending price curve.
//!
//! `price(elapsed) = reserve + (duration - min(elapsed, duration)) * decrement`,
//! which is the same as `initial_price - min(elapsed, duration) * decrement`.
//! Once the configured duration has fully elapsed the price stays pinned at
//! the reserve; it never dips below it and no intermediate value can
//! underflow.

use alloy_primitives::U256;

/// Opening price of the auction: `reserve + duration * decrement`.
///
/// Returns `None` when the product or sum does not fit in a `U256`, so
/// callers can reject such parameters at creation instead of wrapping.
pub fn initial_price(reserve_price: U256, duration: U256, decrement: U256) -> Option<U256> {
    duration
        .checked_mul(decrement)
        .and_then(|span| span.checked_add(reserve_price))
}

/// Price required to win after `elapsed` discrete time units.
///
/// Pure and idempotent: same inputs, same output, no matter how often or
/// how far past `duration` it is queried.
pub fn current_price(
    reserve_price: U256,
    duration: U256,
    decrement: U256,
    elapsed: U256,
) -> U256 {
    let remaining = duration.saturating_sub(elapsed.min(duration));
    reserve_price.saturating_add(remaining.saturating_mul(decrement))
}
