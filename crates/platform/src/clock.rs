//! Tick arithmetic.
//!
//! All pure components take timestamps as microseconds (`Micros`) so they can
//! be driven from host tests without a time source. The firmware tasks feed
//! them from `embassy_time::Instant`; interrupt producers never read the
//! clock at all.

/// Monotonic timestamp in microseconds since boot.
pub type Micros = u64;

/// Convert milliseconds to [`Micros`].
pub const fn millis_to_micros(ms: u64) -> Micros {
    ms.saturating_mul(1_000)
}

/// Convert seconds to [`Micros`].
pub const fn secs_to_micros(secs: u64) -> Micros {
    secs.saturating_mul(1_000_000)
}

/// Elapsed milliseconds between two timestamps, as `f32` for envelope math.
///
/// Saturates at zero when `earlier` is in the future (a producer stamped a
/// byte after the consumer sampled the clock).
#[allow(clippy::cast_precision_loss)] // envelope math tolerates µs rounding
pub fn elapsed_millis_f32(now: Micros, earlier: Micros) -> f32 {
    now.saturating_sub(earlier) as f32 / 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_micros() {
        assert_eq!(millis_to_micros(330), 330_000);
    }

    #[test]
    fn test_secs_to_micros() {
        assert_eq!(secs_to_micros(60), 60_000_000);
    }

    #[test]
    fn test_elapsed_millis_saturates() {
        assert_eq!(elapsed_millis_f32(5, 10), 0.0);
        assert_eq!(elapsed_millis_f32(2_000, 1_000), 1.0);
    }
}
