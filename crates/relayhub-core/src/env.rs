//! Environment abstraction for deterministic testing.
//!
//! Decouples relay logic from system resources (time, randomness). Enables
//! deterministic tests with a manual clock and seeded RNG, and production
//! use with real system resources.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`; simulation uses a virtual clock.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// `instant` advanced by `duration`.
    fn add(&self, instant: Self::Instant, duration: Duration) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only runtime code awaits this; relay logic never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Wall clock in Unix milliseconds.
    ///
    /// Used for server-assigned timestamps on relayed records. May jump, so
    /// never use it for scheduling.
    fn wall_clock_millis(&self) -> u64;

    /// Generates a random `u64`.
    ///
    /// Used for session IDs.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
