//! Store key builders.
//!
//! Every record kind kept in the key-value store gets its key from exactly
//! one function here. Families that share a prefix (`forget:` and
//! `forget:otp:`) stay apart because validated addresses never contain `:`
//! (see [`validate_email`](crate::auth::validate_email)).
//!
//! The names are part of the storage format: existing deployments hold
//! data under these keys, so they must not change.

use crate::otp::OtpFlow;

/// Global quota counter for generative model calls.
pub const GEMINI_LIMIT: &str = "geminiLimit";

/// Pending registration (profile fields, hashed credential, code).
pub fn register_otp(email: &str) -> String {
    format!("register:otp:{email}")
}

/// Pending password reset (code, verified flag).
pub fn forget_otp(email: &str) -> String {
    format!("forget:otp:{email}")
}

/// Forget-password request and reset-verification attempts.
pub fn forget_attempts(email: &str) -> String {
    format!("forget:{email}")
}

/// Login attempts.
pub fn login_attempts(email: &str) -> String {
    format!("login:{email}")
}

/// Marker blocking an immediate OTP resend.
pub fn otp_cooldown(flow: OtpFlow, email: &str) -> String {
    format!("otp:cooldown:{}:{email}", flow.as_str())
}

/// OTP resend counter.
pub fn otp_rate(flow: OtpFlow, email: &str) -> String {
    format!("otp:rate:{}:{email}", flow.as_str())
}

/// Pending record for an OTP flow.
pub fn otp_record(flow: OtpFlow, email: &str) -> String {
    match flow {
        OtpFlow::Register => register_otp(email),
        OtpFlow::ForgetPass => forget_otp(email),
    }
}
