//! Retry helper for the port manager.

use std::time::Duration;

use tgam_traits::Clock;

/// Run `op` up to `attempts` times, sleeping `backoff` on `clock` between
/// failures. Returns the last error when every attempt fails.
///
/// `attempts` is clamped to at least 1.
pub fn retry_with_backoff<T, E, C, F>(
    clock: &C,
    attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, E>
where
    C: Clock + ?Sized,
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %e, "attempt failed, retrying");
                clock.sleep(backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgam_traits::clock::test_clock::TestClock;

    #[test]
    fn succeeds_after_transient_failures() {
        let clock = TestClock::new();
        let r: Result<u32, String> = retry_with_backoff(&clock, 3, Duration::from_millis(500), |n| {
            if n < 3 { Err(format!("fail {n}")) } else { Ok(n) }
        });
        assert_eq!(r, Ok(3));
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn returns_last_error_without_trailing_sleep() {
        let clock = TestClock::new();
        let r: Result<(), String> =
            retry_with_backoff(&clock, 2, Duration::from_millis(500), |n| Err(format!("fail {n}")));
        assert_eq!(r, Err("fail 2".to_string()));
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let clock = TestClock::new();
        let mut calls = 0;
        let _: Result<(), &str> = retry_with_backoff(&clock, 0, Duration::ZERO, |_| {
            calls += 1;
            Err("no")
        });
        assert_eq!(calls, 1);
    }
}
