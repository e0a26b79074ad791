// Client-side rate limiting for Bluesky API calls.
//
// Bluesky allows roughly 3000 requests per 5 minutes per account. Every
// request the bot makes goes through one shared RateLimiter, which keeps a
// sliding window of recent request times, enforces a minimum spacing between
// requests, and honours a cool-down after the server answers 429.
//
// Uses tokio's clock so tests can run with paused time.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 3000;
/// Window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);
/// Minimum spacing between consecutive requests.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(100);

struct Window {
    /// Start times of requests still inside the window, oldest first.
    requests: VecDeque<Instant>,
    last_request: Option<Instant>,
    /// No request may start before this instant (set after a 429).
    paused_until: Option<Instant>,
}

pub struct RateLimiter {
    state: Mutex<Window>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, DEFAULT_MIN_DELAY)
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            state: Mutex::new(Window {
                requests: VecDeque::new(),
                last_request: None,
                paused_until: None,
            }),
            max_requests: max_requests.max(1),
            window,
            min_delay,
        }
    }

    /// Wait until a request may be sent, then record it.
    ///
    /// The lock is only held to compute the next wait; sleeping happens
    /// outside it so concurrent callers are never blocked on the mutex.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.lock();
                let now = Instant::now();
                match self.wait_needed(&mut state, now) {
                    None => {
                        state.requests.push_back(now);
                        state.last_request = Some(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };

            if wait >= Duration::from_secs(1) {
                info!(delay_ms = wait.as_millis() as u64, "Rate limit: waiting before next request");
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Hold back every caller for `duration` (used after a 429).
    pub fn pause_for(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut state = self.lock();
        match state.paused_until {
            Some(current) if current >= until => {}
            _ => state.paused_until = Some(until),
        }
    }

    /// Requests currently counted in the window.
    pub fn in_window(&self) -> usize {
        let mut state = self.lock();
        self.evict(&mut state, Instant::now());
        state.requests.len()
    }

    fn wait_needed(&self, state: &mut Window, now: Instant) -> Option<Duration> {
        if let Some(until) = state.paused_until {
            if until > now {
                return Some(until - now);
            }
            state.paused_until = None;
        }

        if let Some(last) = state.last_request {
            let elapsed = now.duration_since(last);
            if elapsed < self.min_delay {
                return Some(self.min_delay - elapsed);
            }
        }

        self.evict(state, now);
        if (state.requests.len() as u32) < self.max_requests {
            return None;
        }
        // Full: wait for the oldest request to age out
        state
            .requests
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .filter(|wait| !wait.is_zero())
            .or(Some(Duration::from_millis(1)))
    }

    fn evict(&self, state: &mut Window, now: Instant) {
        while let Some(oldest) = state.requests.front() {
            if now.duration_since(*oldest) >= self.window {
                state.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
