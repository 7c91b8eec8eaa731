//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` backs the driver in production: real monotonic time, the wall
//! clock for activity timestamps, Tokio sleeps, and the OS CSPRNG for session
//! IDs. Nothing here is reproducible; tests use the harness `SimEnv`.

use std::time::Duration;

use relayhub_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// Session IDs are drawn from getrandom (e.g. `/dev/urandom` on Linux), so
/// they are unpredictable to clients.
///
/// # Panics
///
/// Panics if the OS RNG fails. A server that cannot draw unpredictable
/// session IDs must not keep accepting connections.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn add(&self, instant: Self::Instant, duration: Duration) -> Self::Instant {
        instant + duration
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
        assert_eq!(env.add(t1, Duration::from_secs(1)) - t1, Duration::from_secs(1));
    }

    #[test]
    fn system_env_random_ids_differ() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64(), "Random IDs should differ");
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_millis() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(50)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_millis(50), "Sleep should wait at least 50ms");
    }
}
