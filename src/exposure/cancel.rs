//! Cancellation signal and the polled exposure timer.
//!
//! There is no hardware completion interrupt for the exposure: the host
//! times it by sleeping in steps of at most [`POLL_INTERVAL`] and checking
//! the cancellation token between steps. A cancellation raised at any
//! point is therefore observed within one interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polling interval of the exposure timer.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared cancellation flag, settable from any thread.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the cancellation signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called and not cleared.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Drops any pending cancellation.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// How the exposure timer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The requested exposure time elapsed.
    Elapsed,
    /// The cancellation signal was observed first.
    Cancelled,
}

/// Waits until `exposure` has elapsed since `started`, or `token` is cancelled.
pub fn wait_for_exposure(
    started: Instant,
    exposure: Duration,
    token: &CancellationToken,
) -> TimerOutcome {
    loop {
        let elapsed = started.elapsed();
        if elapsed >= exposure {
            return TimerOutcome::Elapsed;
        }
        if token.is_cancelled() {
            return TimerOutcome::Cancelled;
        }
        std::thread::sleep((exposure - elapsed).min(POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let remote = token.clone();

        assert!(!token.is_cancelled());
        remote.cancel();
        assert!(token.is_cancelled());
        token.clear();
        assert!(!remote.is_cancelled());
    }

    #[test]
    fn test_timer_elapses() {
        let token = CancellationToken::new();
        let started = Instant::now();

        let outcome = wait_for_exposure(started, Duration::from_millis(30), &token);

        assert_eq!(outcome, TimerOutcome::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_cancellation_observed_promptly() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let raised = Instant::now();
            remote.cancel();
            raised
        });

        let outcome = wait_for_exposure(Instant::now(), Duration::from_secs(5), &token);
        let observed = Instant::now();
        let raised = canceller.join().unwrap();

        assert_eq!(outcome, TimerOutcome::Cancelled);
        // One poll interval plus generous scheduling slack.
        assert!(observed.duration_since(raised) < POLL_INTERVAL + Duration::from_millis(200));
    }

    #[test]
    fn test_pending_cancellation_stops_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Instant::now();

        assert_eq!(
            wait_for_exposure(started, Duration::from_secs(5), &token),
            TimerOutcome::Cancelled
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
