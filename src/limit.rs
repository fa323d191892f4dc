//! Windowed attempt counters.
//!
//! A [`RateWindow`] is a counter key, a window length and a threshold. Each
//! attempt calls [`RateWindow::admit`], which increments the counter and
//! starts the window on the first increment, both in one atomic store step.
//! The window ends when the store expires the key; callers keep no clocks.
//!
//! Attempts are counted before the threshold check, so rejected attempts
//! count too. Under a burst this rejects a few calls that a read-then-write
//! check would have let through, but no number of concurrent callers can
//! all slip past a stale read.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::keys;
use crate::store::KeyValueStore;
use crate::telemetry;
use crate::{ItineraError, Result};

/// Window length and threshold for one counter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowPolicy {
    /// Window length in seconds.
    pub window_secs: u64,
    /// Attempts admitted per window.
    pub max_attempts: u64,
}

impl WindowPolicy {
    pub const fn new(window_secs: u64, max_attempts: u64) -> Self {
        Self {
            window_secs,
            max_attempts,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Global generative model quota: 10 calls per 60 seconds.
pub const GEMINI_QUOTA: WindowPolicy = WindowPolicy::new(60, 10);
/// Login attempts: 5 per 10 minutes.
pub const LOGIN: WindowPolicy = WindowPolicy::new(600, 5);
/// Forget-password requests and reset verifications: 10 per 10 minutes.
pub const FORGET_PASSWORD: WindowPolicy = WindowPolicy::new(600, 10);
/// OTP resends: 5 per 10 minutes.
pub const OTP_RESEND: WindowPolicy = WindowPolicy::new(600, 5);

/// An admitted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Attempts counted in the current window, this one included.
    pub count: u64,
    /// Time until the window resets.
    pub window_remaining: Duration,
}

/// A counter admitting at most `threshold` attempts per `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    key: String,
    window: Duration,
    threshold: u64,
    /// Metrics label.
    family: &'static str,
    message: &'static str,
}

impl RateWindow {
    pub fn new(key: impl Into<String>, window: Duration, threshold: u64) -> Self {
        Self {
            key: key.into(),
            window,
            threshold,
            family: "custom",
            message: "too many requests",
        }
    }

    fn from_policy(
        key: String,
        policy: WindowPolicy,
        family: &'static str,
        message: &'static str,
    ) -> Self {
        Self {
            key,
            window: policy.window(),
            threshold: policy.max_attempts,
            family,
            message,
        }
    }

    /// The quota shared by every generative model call.
    pub fn gemini_quota(policy: WindowPolicy) -> Self {
        Self::from_policy(
            keys::GEMINI_LIMIT.to_string(),
            policy,
            "geminiLimit",
            "generative model quota exceeded",
        )
    }

    /// Login attempts for one address.
    pub fn login(email: &str, policy: WindowPolicy) -> Self {
        Self::from_policy(keys::login_attempts(email), policy, "login", "too many requests")
    }

    /// Forget-password attempts for one address.
    pub fn forget_password(email: &str, policy: WindowPolicy) -> Self {
        Self::from_policy(keys::forget_attempts(email), policy, "forget", "too many requests")
    }

    /// OTP resends for one address and flow.
    pub fn otp_resend(flow: crate::otp::OtpFlow, email: &str, policy: WindowPolicy) -> Self {
        Self::from_policy(keys::otp_rate(flow, email), policy, "otp:rate", "too many otp resends")
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Count one attempt and decide whether it is admitted.
    ///
    /// Rejections are `RateLimited` errors carrying the time until the
    /// window resets (at least one second).
    pub async fn admit(&self, store: &dyn KeyValueStore) -> Result<Admission> {
        let counted = store.incr_window(&self.key, self.window).await?;

        if counted.count > self.threshold {
            let retry_after = counted.remaining.max(Duration::from_secs(1));
            debug!(
                key = %self.key,
                count = counted.count,
                threshold = self.threshold,
                retry_after_secs = retry_after.as_secs(),
                "rate window exhausted"
            );
            metrics::counter!(telemetry::RATE_LIMIT_REJECTIONS_TOTAL, "window" => self.family)
                .increment(1);
            return Err(ItineraError::rate_limited(self.message, retry_after));
        }

        Ok(Admission {
            count: counted.count,
            window_remaining: counted.remaining,
        })
    }

    /// Drop the counter, starting over with the next attempt.
    pub async fn reset(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.del(&self.key).await.map(|_| ())
    }
}
