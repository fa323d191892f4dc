//! Account flows: registration, login and password reset.
//!
//! [`AccountService`] ties the user directory, the OTP coordinator, the
//! windowed attempt counters and the mailer together.
//! [`AccountService::login`] returns a signed session token (see
//! [`session`]) that [`AccountService::verify_session`] turns back into the
//! account; carrying it, as a cookie or otherwise, is up to the HTTP layer.

pub mod password;
pub mod session;

pub use password::{Argon2Hasher, CredentialHasher};
pub use session::{Session, SessionClaims, SessionKeys};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::limit::{self, RateWindow, WindowPolicy};
use crate::mail::{self, MailContent, MailSender};
use crate::otp::{OtpCoordinator, OtpFlow, ResetState};
use crate::store::KeyValueStore;
use crate::users::{NewUser, UserDirectory, UserProfile};
use crate::{ItineraError, Result};

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Payload of a pending registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// Credential hash, never the plain password.
    #[serde(rename = "password")]
    pub password_hash: String,
}

/// Attempt limits of the account flows.
#[derive(Debug, Clone, Copy)]
pub struct AccountLimits {
    pub login: WindowPolicy,
    /// Shared by forget-password requests and reset verifications.
    pub forget_password: WindowPolicy,
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self {
            login: limit::LOGIN,
            forget_password: limit::FORGET_PASSWORD,
        }
    }
}

/// Check the shape of an email address.
///
/// Accepts `local@domain.tld` without whitespace. `:` is refused anywhere
/// because addresses become part of store keys.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || ItineraError::Validation(format!("invalid email address: {email:?}"));

    if email.is_empty() || email.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Require at least [`MIN_PASSWORD_LEN`] characters with a letter and a digit.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ItineraError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(ItineraError::Validation(
            "password must contain a letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ItineraError::Validation(
            "password must contain a number".to_string(),
        ));
    }
    Ok(())
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ItineraError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Registration, login and password reset.
pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn KeyValueStore>,
    otp: Arc<OtpCoordinator>,
    mailer: Arc<dyn MailSender>,
    hasher: Arc<dyn CredentialHasher>,
    sessions: SessionKeys,
    limits: AccountLimits,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn KeyValueStore>,
        otp: Arc<OtpCoordinator>,
        mailer: Arc<dyn MailSender>,
        hasher: Arc<dyn CredentialHasher>,
        sessions: SessionKeys,
        limits: AccountLimits,
    ) -> Self {
        Self {
            users,
            store,
            otp,
            mailer,
            hasher,
            sessions,
            limits,
        }
    }

    /// Start a registration: store the pending account and mail a code.
    pub async fn register(&self, full_name: &str, email: &str, password: &str) -> Result<()> {
        require(full_name, "fullName")?;
        let email = email.trim();
        validate_email(email)?;
        validate_password(password)?;

        if self.users.find_by_email(email).await?.is_some() {
            return Err(ItineraError::Conflict("user is already registered".to_string()));
        }

        let pending = PendingRegistration {
            full_name: full_name.trim().to_string(),
            password_hash: self.hash(password).await?,
        };
        let code = self.otp.issue(OtpFlow::Register, email, &pending).await?;
        self.deliver(OtpFlow::Register, email, mail::verification_mail(&code))
            .await
    }

    /// Finish a registration with the mailed code.
    ///
    /// The pending record is claimed before the account is created, so two
    /// concurrent verifications create at most one account. If the directory
    /// fails for a reason other than a duplicate, the record is put back and
    /// the same code can be tried again.
    pub async fn verify_registration(&self, email: &str, otp: &str) -> Result<UserProfile> {
        require(email, "email")?;
        require(otp, "otp")?;
        let email = email.trim();

        let pending: PendingRegistration = self.otp.claim(OtpFlow::Register, email, otp).await?;

        let created = self
            .users
            .create(NewUser {
                full_name: pending.full_name.clone(),
                email: email.to_string(),
                password_hash: pending.password_hash.clone(),
            })
            .await;

        match created {
            Ok(user) => {
                info!(email, user_id = %user.id, "user registered");
                Ok(UserProfile::from(&user))
            }
            Err(e @ ItineraError::Conflict(_)) => Err(e),
            Err(e) => {
                self.otp.restore(OtpFlow::Register, email, &pending, otp).await;
                Err(e)
            }
        }
    }

    /// Check credentials and open a session. Five attempts per address per
    /// ten minutes.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        require(email, "email")?;
        require(password, "password")?;
        let email = email.trim();

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ItineraError::NotFound("user not registered".to_string()))?;

        let window = RateWindow::login(email, self.limits.login);
        window.admit(self.store.as_ref()).await?;

        if !self.verify(password, &user.password_hash).await? {
            return Err(ItineraError::Unauthorized(
                "password does not match".to_string(),
            ));
        }

        window.reset(self.store.as_ref()).await?;
        let token = self.sessions.issue(user.id)?;
        info!(email, user_id = %user.id, "user logged in");
        Ok(Session {
            token,
            expires_in: self.sessions.ttl(),
            user: UserProfile::from(&user),
        })
    }

    /// Resolve a session token to its account.
    ///
    /// A missing token, a bad signature, an expired token and a deleted
    /// account are all `Unauthorized`.
    pub async fn verify_session(&self, token: &str) -> Result<UserProfile> {
        if token.trim().is_empty() {
            return Err(ItineraError::Unauthorized("unauthorized access".to_string()));
        }
        let claims = self.sessions.verify(token.trim())?;
        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(session::token_failed)?;
        Ok(UserProfile::from(&user))
    }

    /// Mail a password reset code.
    pub async fn forget_password(&self, email: &str) -> Result<()> {
        require(email, "email")?;
        let email = email.trim();

        self.users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ItineraError::NotFound("user not registered".to_string()))?;

        RateWindow::forget_password(email, self.limits.forget_password)
            .admit(self.store.as_ref())
            .await?;

        let code = self
            .otp
            .issue(OtpFlow::ForgetPass, email, &ResetState::default())
            .await?;
        self.deliver(OtpFlow::ForgetPass, email, mail::password_reset_mail(&code))
            .await
    }

    /// Check a reset code; a verified reset allows one password change.
    pub async fn verify_reset(&self, email: &str, otp: &str) -> Result<()> {
        require(email, "email")?;
        require(otp, "otp")?;
        let email = email.trim();

        let window = RateWindow::forget_password(email, self.limits.forget_password);
        window.admit(self.store.as_ref()).await?;

        self.otp.mark_verified(email, otp).await?;
        window.reset(self.store.as_ref()).await?;
        info!(email, "password reset verified");
        Ok(())
    }

    /// Set a new password after [`verify_reset`](Self::verify_reset).
    pub async fn reset_password(&self, email: &str, password: &str) -> Result<()> {
        require(email, "email")?;
        let email = email.trim();
        validate_password(password)?;

        self.otp.consume_verified_reset(email).await?;

        let hash = self.hash(password).await?;
        self.users.update_credential(email, &hash).await?;
        info!(email, "password reset");
        Ok(())
    }

    /// Mail a fresh code for a pending flow.
    pub async fn resend_otp(&self, email: &str, flow: OtpFlow) -> Result<()> {
        require(email, "email")?;
        let email = email.trim();
        let exists = self.users.find_by_email(email).await?.is_some();

        let content = match flow {
            OtpFlow::Register => {
                if exists {
                    return Err(ItineraError::Conflict("user is already registered".to_string()));
                }
                let code = self
                    .otp
                    .resend(flow, email, |pending: Option<PendingRegistration>| {
                        pending.ok_or(ItineraError::OtpExpired)
                    })
                    .await?;
                mail::verification_mail(&code)
            }
            OtpFlow::ForgetPass => {
                if !exists {
                    return Err(ItineraError::NotFound("user not registered".to_string()));
                }
                let code = self
                    .otp
                    .resend(flow, email, |_: Option<ResetState>| Ok(ResetState::default()))
                    .await?;
                mail::password_reset_mail(&code)
            }
        };
        self.deliver(flow, email, content).await
    }

    /// Send a code. An undelivered code lifts the cooldown so the user can
    /// ask again right away.
    async fn deliver(&self, flow: OtpFlow, email: &str, content: MailContent) -> Result<()> {
        let sent = self
            .mailer
            .send(email, &content.subject, &content.html)
            .await;
        if let Err(e) = &sent {
            warn!(%flow, email, error = %e, "otp mail not delivered");
            self.otp.clear_cooldown(flow, email).await;
        }
        sent
    }

    async fn hash(&self, password: &str) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ItineraError::Configuration(format!("hashing task failed: {e}")))?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| ItineraError::Configuration(format!("hashing task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        for ok in ["a@b.co", "first.last+tag@mail.example.org"] {
            assert!(validate_email(ok).is_ok(), "{ok}");
        }
        for bad in ["", "plain", "@b.co", "a@", "a@b", "a@b..co", "a b@c.de", "a:b@c.de", "a@b@c.de"] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("abcdefg1").is_ok());
        assert!(validate_password("abc1").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("abcdefgh").is_err());
    }

    #[test]
    fn pending_registration_uses_stored_field_names() {
        let pending = PendingRegistration {
            full_name: "Ada".to_string(),
            password_hash: "$argon2id$...".to_string(),
        };
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["fullName"], "Ada");
        assert_eq!(json["password"], "$argon2id$...");
    }
}
