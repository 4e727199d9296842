// Rolling-window request throttle.
//
// Each outbound client owns its own instance: a 24-hour window for the
// Google Ads API and a 1-minute window for Airtable. State is a plain
// counter/reset-instant pair behind a mutex, so the quota only covers this
// process; concurrent deployments would need a shared counter, which this
// service does not attempt.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

struct Window {
    requests: u32,
    reset_at: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(Window {
                requests: 0,
                reset_at: Instant::now() + window,
            }),
        }
    }

    /// Claim one unit of quota, sleeping until the window resets when the
    /// counter is full. The counter mutation happens under the lock, so
    /// concurrent callers cannot overshoot the maximum.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.state.lock().await;
                let now = Instant::now();
                if now >= window.reset_at {
                    window.requests = 0;
                    window.reset_at = now + self.window;
                }
                if window.requests < self.max_requests {
                    window.requests += 1;
                    return;
                }
                window.reset_at - now
            };

            tracing::warn!(
                wait_ms = wait.as_millis() as u64,
                "rate limit reached, waiting for window reset"
            );
            sleep(wait).await;
        }
    }

    /// Units claimed in the current window.
    #[cfg(test)]
    pub(crate) async fn used(&self) -> u32 {
        self.state.lock().await.requests
    }
}
