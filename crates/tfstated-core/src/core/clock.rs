// crates/tfstated-core/src/core/clock.rs
// ============================================================================
// Module: tfstated Clock
// Description: Wall-clock sampling in unix seconds.
// Purpose: Give every record the same timestamp resolution.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Persisted timestamps are unix seconds stored as signed 64-bit integers.
//! Callers sample the clock once per operation and reuse the value for every
//! timestamp and cutoff computed inside that operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Seconds in one day, used for retention age floors.
pub const SECONDS_PER_DAY: i64 = 86_400;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Returns the current wall-clock time in unix seconds.
///
/// Clocks set before the epoch read as zero.
#[must_use]
pub fn unix_seconds() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_secs()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_seconds_is_after_2020() {
        assert!(unix_seconds() > 1_577_836_800);
    }
}
