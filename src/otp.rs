//! One-time passcode coordination.
//!
//! [`OtpCoordinator`] keeps one pending record per (flow, address) in the
//! shared store, next to two independent helper keys: a resend cooldown
//! marker and a resend counter. Records move through
//!
//! ```text
//! absent → pending → verified (reset flow only) → consumed
//!                  ↘ expired (TTL)
//! ```
//!
//! The record payload is flow specific and opaque here: the coordinator
//! stores `payload + otp` as one flat JSON object, so a registration record
//! reads `{"fullName", "password", "otp"}` and a reset record
//! `{"verified", "otp"}`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::keys;
use crate::limit::{self, RateWindow, WindowPolicy};
use crate::store::KeyValueStore;
use crate::telemetry;
use crate::{ItineraError, Result};

/// Default validity of a pending record: 5 minutes.
pub const DEFAULT_OTP_TTL: Duration = Duration::from_secs(300);
/// Default pause between two codes for the same flow and address.
pub const DEFAULT_RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// Which flow a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtpFlow {
    #[serde(rename = "register")]
    Register,
    #[serde(rename = "forgetPass")]
    ForgetPass,
}

impl OtpFlow {
    /// Name used in store keys and requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ForgetPass => "forgetPass",
        }
    }
}

impl fmt::Display for OtpFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpFlow {
    type Err = ItineraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "register" => Ok(Self::Register),
            "forgetPass" => Ok(Self::ForgetPass),
            _ => Err(ItineraError::Validation(
                "type must be register or forgetPass".to_string(),
            )),
        }
    }
}

/// Source of fresh codes.
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform six-digit codes from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOtp;

impl OtpGenerator for RandomOtp {
    fn generate(&self) -> String {
        rand::rng().random_range(100_000..=999_999u32).to_string()
    }
}

/// Timing and limits of the OTP flows.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    /// Validity of a pending record.
    pub ttl: Duration,
    /// Minimum pause between two codes for one flow and address.
    pub cooldown: Duration,
    /// Resend counter window.
    pub resend: WindowPolicy,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_OTP_TTL,
            cooldown: DEFAULT_RESEND_COOLDOWN,
            resend: limit::OTP_RESEND,
        }
    }
}

/// Payload of a pending password reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetState {
    pub verified: bool,
}

#[derive(Serialize, Deserialize)]
struct OtpRecord<P> {
    #[serde(flatten)]
    payload: P,
    otp: String,
}

/// Issues, verifies and consumes pending OTP records.
pub struct OtpCoordinator {
    store: Arc<dyn KeyValueStore>,
    generator: Arc<dyn OtpGenerator>,
    policy: OtpPolicy,
}

impl OtpCoordinator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        generator: Arc<dyn OtpGenerator>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            generator,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Start a flow: store `payload` with a fresh code, return the code.
    ///
    /// Refused with `RateLimited` while a cooldown from an earlier code is
    /// running. Any existing pending record is replaced.
    pub async fn issue<P>(&self, flow: OtpFlow, email: &str, payload: &P) -> Result<String>
    where
        P: Serialize + Sync,
    {
        self.check_cooldown(flow, email).await?;

        let code = self.generator.generate();
        self.persist(flow, email, payload, &code).await?;
        self.start_cooldown(flow, email).await;

        info!(%flow, email, "otp issued");
        metrics::counter!(telemetry::OTP_ISSUED_TOTAL, "flow" => flow.as_str()).increment(1);
        Ok(code)
    }

    /// Replace the code of a flow, return the new code.
    ///
    /// Checks the cooldown, then counts the resend against the resend
    /// window. `refresh` receives the current payload (if the record is
    /// still pending) and returns the payload to store with the new code.
    pub async fn resend<P, F>(&self, flow: OtpFlow, email: &str, refresh: F) -> Result<String>
    where
        P: Serialize + DeserializeOwned + Sync,
        F: FnOnce(Option<P>) -> Result<P> + Send,
    {
        self.check_cooldown(flow, email).await?;
        RateWindow::otp_resend(flow, email, self.policy.resend)
            .admit(self.store.as_ref())
            .await?;

        let current = self.load::<P>(flow, email).await?.map(|r| r.payload);
        let payload = refresh(current)?;

        let code = self.generator.generate();
        self.persist(flow, email, &payload, &code).await?;
        self.start_cooldown(flow, email).await;

        info!(%flow, email, "otp resent");
        metrics::counter!(telemetry::OTP_ISSUED_TOTAL, "flow" => flow.as_str()).increment(1);
        Ok(code)
    }

    /// Check `code` against the pending record and return its payload.
    ///
    /// A missing record is `OtpExpired`; a wrong code is `OtpMismatch` and
    /// leaves the record in place for another try.
    pub async fn verify<P>(&self, flow: OtpFlow, email: &str, code: &str) -> Result<P>
    where
        P: DeserializeOwned,
    {
        let Some(record) = self.load::<P>(flow, email).await? else {
            record_verification(flow, "expired");
            return Err(ItineraError::OtpExpired);
        };
        if record.otp != code {
            record_verification(flow, "mismatch");
            return Err(ItineraError::OtpMismatch);
        }
        record_verification(flow, "ok");
        Ok(record.payload)
    }

    /// Verify, apply `update` to the payload and store it again with a
    /// fresh TTL.
    pub async fn verify_and_update<P, F>(
        &self,
        flow: OtpFlow,
        email: &str,
        code: &str,
        update: F,
    ) -> Result<P>
    where
        P: Serialize + DeserializeOwned + Sync,
        F: FnOnce(&mut P) + Send,
    {
        let mut payload = self.verify::<P>(flow, email, code).await?;
        update(&mut payload);
        self.persist(flow, email, &payload, code).await?;
        Ok(payload)
    }

    /// Verify a reset code and flag the record as verified.
    pub async fn mark_verified(&self, email: &str, code: &str) -> Result<()> {
        self.verify_and_update::<ResetState, _>(OtpFlow::ForgetPass, email, code, |state| {
            state.verified = true
        })
        .await
        .map(|_| ())
    }

    /// Delete a reset record that went through [`mark_verified`](Self::mark_verified).
    ///
    /// An unverified record is refused with `Unauthorized` and left in place.
    pub async fn consume_verified_reset(&self, email: &str) -> Result<()> {
        self.consume::<ResetState, _>(OtpFlow::ForgetPass, email, |state| {
            if state.verified {
                Ok(())
            } else {
                Err(ItineraError::Unauthorized("otp not verified".to_string()))
            }
        })
        .await
        .map(|_| ())
    }

    /// Verify and delete in one go; only one caller can claim a record.
    ///
    /// The delete decides the winner: a concurrent duplicate that verified
    /// the same code but lost the delete gets `OtpExpired`.
    pub async fn claim<P>(&self, flow: OtpFlow, email: &str, code: &str) -> Result<P>
    where
        P: DeserializeOwned,
    {
        let payload = self.verify::<P>(flow, email, code).await?;
        if !self.store.del(&keys::otp_record(flow, email)).await? {
            debug!(%flow, email, "otp record claimed concurrently");
            return Err(ItineraError::OtpExpired);
        }
        Ok(payload)
    }

    /// Put a claimed record back so the flow can be retried.
    ///
    /// Best effort: a failure is logged, not returned.
    pub async fn restore<P>(&self, flow: OtpFlow, email: &str, payload: &P, code: &str)
    where
        P: Serialize + Sync,
    {
        if let Err(e) = self.persist(flow, email, payload, code).await {
            warn!(%flow, email, error = %e, "failed to restore otp record");
        }
    }

    /// Load the pending record, check `precondition` and delete it.
    pub async fn consume<P, F>(&self, flow: OtpFlow, email: &str, precondition: F) -> Result<P>
    where
        P: DeserializeOwned,
        F: FnOnce(&P) -> Result<()> + Send,
    {
        let record = self
            .load::<P>(flow, email)
            .await?
            .ok_or(ItineraError::OtpExpired)?;
        precondition(&record.payload)?;
        self.store.del(&keys::otp_record(flow, email)).await?;
        Ok(record.payload)
    }

    /// Time left on the resend cooldown, if one is running.
    ///
    /// The marker is always written with an expiry, so its TTL alone tells
    /// whether a cooldown is running.
    pub async fn cooldown_remaining(&self, flow: OtpFlow, email: &str) -> Result<Option<Duration>> {
        self.store.ttl(&keys::otp_cooldown(flow, email)).await
    }

    /// Lift the resend cooldown, e.g. after the code could not be mailed.
    ///
    /// Best effort: a failure is logged, not returned.
    pub async fn clear_cooldown(&self, flow: OtpFlow, email: &str) {
        if let Err(e) = self.store.del(&keys::otp_cooldown(flow, email)).await {
            warn!(%flow, email, error = %e, "failed to clear otp cooldown");
        }
    }

    async fn check_cooldown(&self, flow: OtpFlow, email: &str) -> Result<()> {
        match self.cooldown_remaining(flow, email).await? {
            Some(remaining) => Err(ItineraError::rate_limited(
                "please wait before requesting another otp",
                remaining.max(Duration::from_secs(1)),
            )),
            None => Ok(()),
        }
    }

    async fn start_cooldown(&self, flow: OtpFlow, email: &str) {
        let key = keys::otp_cooldown(flow, email);
        if let Err(e) = self.store.set_ex(&key, "1", self.policy.cooldown).await {
            warn!(%flow, email, error = %e, "failed to set otp cooldown");
        }
    }

    async fn load<P: DeserializeOwned>(
        &self,
        flow: OtpFlow,
        email: &str,
    ) -> Result<Option<OtpRecord<P>>> {
        let raw = self.store.get(&keys::otp_record(flow, email)).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(ItineraError::from)
    }

    async fn persist<P>(&self, flow: OtpFlow, email: &str, payload: &P, code: &str) -> Result<()>
    where
        P: Serialize + Sync,
    {
        let record = OtpRecord {
            payload,
            otp: code.to_string(),
        };
        let raw = serde_json::to_string(&record)?;
        self.store
            .set_ex(&keys::otp_record(flow, email), &raw, self.policy.ttl)
            .await
    }
}

fn record_verification(flow: OtpFlow, status: &'static str) {
    metrics::counter!(
        telemetry::OTP_VERIFICATIONS_TOTAL,
        "flow" => flow.as_str(),
        "status" => status,
    )
    .increment(1);
}
