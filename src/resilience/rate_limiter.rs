use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub rate: u32,
    pub window: Duration,
    /// Starts admitted within the current trailing window.
    pub in_window: usize,
    /// Estimated wait time until a slot is available (ms), if currently full.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum request starts per window. Zero disables limiting.
    pub rate: u32,
    /// Window length (one second for requests-per-second).
    pub window: Duration,
}

impl RateLimiterConfig {
    pub fn per_second(rate: u32) -> Self {
        Self {
            rate,
            window: Duration::from_secs(1),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(25)
    }
}

#[derive(Debug)]
struct State {
    /// Start instants still inside the trailing window, oldest first.
    starts: VecDeque<Instant>,
}

/// Sliding-window rate limiter.
///
/// Admits at most `rate` acquisitions in any trailing `window`. Slots free up
/// as their start instant ages out of the window, so there is no explicit
/// release. Waiters are woken in no particular order.
#[derive(Debug)]
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let capacity = cfg.rate as usize;
        Self {
            cfg,
            state: Mutex::new(State {
                starts: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn prune_locked(cfg: &RateLimiterConfig, st: &mut State, now: Instant) {
        while let Some(oldest) = st.starts.front() {
            if now.duration_since(*oldest) >= cfg.window {
                st.starts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest start leaves the window.
    fn wait_locked(cfg: &RateLimiterConfig, st: &State, now: Instant) -> Duration {
        st.starts
            .front()
            .map(|oldest| (*oldest + cfg.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Wait until one more request may start. Never fails, only delays.
    pub async fn acquire(&self) {
        let cfg = &self.cfg;
        if cfg.rate == 0 {
            return;
        }

        loop {
            let wait_duration = {
                let mut st = self.state.lock().await;
                let now = Instant::now();
                Self::prune_locked(cfg, &mut st, now);

                if st.starts.len() < cfg.rate as usize {
                    st.starts.push_back(now);
                    return;
                }
                Self::wait_locked(cfg, &st, now)
            };

            if wait_duration > Duration::ZERO {
                tokio::time::sleep(wait_duration).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    /// Try to take a slot without waiting, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        let cfg = &self.cfg;
        if cfg.rate == 0 {
            return true;
        }

        let mut st = self.state.lock().await;
        let now = Instant::now();
        Self::prune_locked(cfg, &mut st, now);

        if st.starts.len() < cfg.rate as usize {
            st.starts.push_back(now);
            true
        } else {
            false
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let cfg = &self.cfg;
        let mut st = self.state.lock().await;
        let now = Instant::now();
        Self::prune_locked(cfg, &mut st, now);

        let estimated_wait_ms = if cfg.rate > 0 && st.starts.len() >= cfg.rate as usize {
            Some(Self::wait_locked(cfg, &st, now).as_millis() as u64)
        } else {
            None
        };

        RateLimiterSnapshot {
            rate: cfg.rate,
            window: cfg.window,
            in_window: st.starts.len(),
            estimated_wait_ms,
        }
    }
}
