//! Tiny deterministic RNG for simulation op streams.
//!
//! XorShift64: fast, full-period, and reproducible — the same seed always
//! yields the same op stream, which is what makes sim failures replayable.
//! Not `Copy`, so a stream cannot be duplicated by accident.

/// Deterministic XorShift64 generator.
#[derive(Clone, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Creates a generator from a seed. Seed 0 is remapped to a fixed
    /// non-zero value to avoid the all-zero lockup state.
    #[inline]
    pub fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state: seed }
    }

    /// Next raw value. Shift constants (13, 7, 17) are Marsaglia's.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in `[0, upper)`. Uses the high bits (XorShift's low bits
    /// are the weaker ones).
    ///
    /// # Panics
    /// Panics if `upper` is 0.
    #[inline]
    pub fn next_u32(&mut self, upper: u32) -> u32 {
        assert!(upper > 0, "upper bound must be > 0");
        if upper.is_power_of_two() {
            return ((self.next_u64() >> 32) as u32) & (upper - 1);
        }
        // Multiply-high maps [0, 2^32) onto [0, upper) closely enough for op
        // selection; this is a fuzzing dial, not a statistics kit.
        let x = (self.next_u64() >> 32) as u32;
        ((u64::from(x) * u64::from(upper)) >> 32) as u32
    }

    /// Returns `true` with probability `numerator / denominator`.
    ///
    /// # Panics
    /// Panics if `denominator` is 0 or `numerator > denominator`.
    #[inline]
    pub fn chance(&mut self, numerator: u32, denominator: u32) -> bool {
        assert!(denominator > 0);
        assert!(numerator <= denominator);
        self.next_u32(denominator) < numerator
    }
}
