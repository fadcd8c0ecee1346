use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Fixed-window limiter for key-set fetches.
///
/// Allows at most `limit` acquisitions per `window`. Never waits: a caller
/// that finds the window exhausted is refused, so a burst of tokens with
/// unknown key ids cannot queue up requests against the key-set endpoint.
pub(crate) struct FetchThrottle {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

struct Window {
    opened: Option<Instant>,
    used: u32,
}

impl FetchThrottle {
    pub(crate) fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window { opened: None, used: 0 }),
        }
    }

    /// Claims one fetch slot if the current window has one left.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let expired = state
            .opened
            .is_none_or(|opened| now.duration_since(opened) >= self.window);
        if expired {
            state.opened = Some(now);
            state.used = 0;
        }
        if state.used < self.limit {
            state.used += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_per_window() {
        let throttle = FetchThrottle::new(3, Duration::from_secs(60));
        assert!(throttle.try_acquire());
        assert!(throttle.try_acquire());
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());
    }

    #[test]
    fn window_reopens_after_it_elapses() {
        let throttle = FetchThrottle::new(1, Duration::from_millis(20));
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());
        std::thread::sleep(Duration::from_millis(30));
        assert!(throttle.try_acquire());
    }

    #[test]
    fn zero_limit_refuses_everything() {
        let throttle = FetchThrottle::new(0, Duration::from_secs(60));
        assert!(!throttle.try_acquire());
    }
}
