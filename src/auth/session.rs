//! Signed session tokens.
//!
//! A session is an HS256 JWT carrying the user id and an expiry. The token
//! is self-contained; revocation is not supported and a token stays valid
//! until `exp`.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::users::UserProfile;
use crate::{ItineraError, Result};

/// Default session lifetime: 10 days.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(10 * 24 * 60 * 60);

/// Claims of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: Uuid,
    /// Issued at, seconds since the epoch.
    pub iat: u64,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// A successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    #[serde(with = "seconds")]
    pub expires_in: Duration,
    pub user: UserProfile,
}

mod seconds {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionKeys {
    /// Keys from a shared secret. An empty secret is refused.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(ItineraError::Configuration(
                "session secret must not be empty".to_string(),
            ));
        }
        if ttl.is_zero() {
            return Err(ItineraError::Configuration(
                "session lifetime must be positive".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    /// Keys from a fresh random secret. Tokens do not survive a restart.
    pub fn random(ttl: Duration) -> Result<Self> {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self::new(&secret, ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user_id`, valid for the configured lifetime.
    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = SessionClaims {
            user_id,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ItineraError::Configuration(format!("failed to sign session token: {e}")))
    }

    /// Check signature and expiry and return the claims.
    ///
    /// Every failure is `Unauthorized("token failed")`.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "session token rejected");
                token_failed()
            })
    }
}

pub(crate) fn token_failed() -> ItineraError {
    ItineraError::Unauthorized("token failed".to_string())
}
