// src/resilience/tests/mod.rs
//! Tests for resilience features


// Common test utilities for resilience testing
pub(crate) mod utils {
    use std::time::Duration;

    /// Assert two durations agree to the millisecond
    pub fn assert_close(actual: Duration, expected: Duration) {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= Duration::from_millis(1),
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }
}
