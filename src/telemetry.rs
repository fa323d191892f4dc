//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (prometheus, statsd, ...);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `itinera_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — AI operation (`searchField`, `createPlan`)
//! - `window` — rate window key family (`geminiLimit`, `login`, `forget`, `otp:rate`)
//! - `flow` — OTP flow (`register`, `forgetPass`)
//! - `status` — outcome: "ok" or "error"

/// Total AI response cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "itinera_cache_hits_total";

/// Total AI response cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "itinera_cache_misses_total";

/// Total attempts rejected by a rate window.
///
/// Labels: `window`.
pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "itinera_rate_limit_rejections_total";

/// Total generative model calls.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const GENERATIVE_REQUESTS_TOTAL: &str = "itinera_generative_requests_total";

/// Generative model call duration in seconds.
///
/// Labels: `operation`.
pub const GENERATIVE_DURATION_SECONDS: &str = "itinera_generative_duration_seconds";

/// Total retry attempts against the generative model (not counting the first).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "itinera_retries_total";

/// Total OTP codes issued, including resends.
///
/// Labels: `flow`.
pub const OTP_ISSUED_TOTAL: &str = "itinera_otp_issued_total";

/// Total OTP verification attempts.
///
/// Labels: `flow`, `status` ("ok" | "expired" | "mismatch").
pub const OTP_VERIFICATIONS_TOTAL: &str = "itinera_otp_verifications_total";
