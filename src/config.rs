//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. an explicit path (CLI flag)
//! 2. `~/.itinera/config.toml` (user)
//! 3. `/etc/itinera/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.itinera/secrets.toml` (user, must be 0600)
//! 2. `/etc/itinera/secrets.toml` (system, must be 0600)
//!
//! Every section is optional; missing values fall back to the deployed
//! defaults.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::AccountLimits;
use crate::auth::session::DEFAULT_SESSION_TTL;
use crate::cache::CacheConfig;
use crate::generative::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, RetryConfig};
use crate::limit::{self, WindowPolicy};
use crate::mail::{DEFAULT_BREVO_BASE_URL, Sender};
use crate::otp::OtpPolicy;
use crate::planner::PlannerConfig;
use crate::{ItineraError, Result};

const CONFIG_DIR: &str = ".itinera";
const SYSTEM_DIR: &str = "/etc/itinera";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Key-value store backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Redis URL. Without one, an in-process store is used.
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Generative model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Bound on one model call in seconds (default: 30).
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_model_timeout() -> u64 {
    30
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Retention of cached responses in seconds (default: 86400).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60 * 60 * 24
}

/// Windowed counters.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_gemini_quota")]
    pub gemini: WindowPolicy,
    #[serde(default = "default_login")]
    pub login: WindowPolicy,
    #[serde(default = "default_forget_password")]
    pub forget_password: WindowPolicy,
    #[serde(default = "default_otp_resend")]
    pub otp_resend: WindowPolicy,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            gemini: default_gemini_quota(),
            login: default_login(),
            forget_password: default_forget_password(),
            otp_resend: default_otp_resend(),
        }
    }
}

fn default_gemini_quota() -> WindowPolicy {
    limit::GEMINI_QUOTA
}

fn default_login() -> WindowPolicy {
    limit::LOGIN
}

fn default_forget_password() -> WindowPolicy {
    limit::FORGET_PASSWORD
}

fn default_otp_resend() -> WindowPolicy {
    limit::OTP_RESEND
}

/// OTP timing.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Validity of a pending record in seconds (default: 300).
    #[serde(default = "default_otp_ttl")]
    pub ttl_secs: u64,
    /// Pause between two codes in seconds (default: 60).
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_otp_ttl(),
            cooldown_secs: default_cooldown(),
        }
    }
}

fn default_otp_ttl() -> u64 {
    300
}

fn default_cooldown() -> u64 {
    60
}

/// Outgoing mail.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_base_url")]
    pub base_url: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default = "default_sender_email")]
    pub sender_email: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            base_url: default_mail_base_url(),
            sender_name: default_sender_name(),
            sender_email: default_sender_email(),
        }
    }
}

fn default_mail_base_url() -> String {
    DEFAULT_BREVO_BASE_URL.to_string()
}

fn default_sender_name() -> String {
    "Itinera".to_string()
}

fn default_sender_email() -> String {
    "no-reply@itinera.app".to_string()
}

/// Login sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Token lifetime in seconds (default: 864000, ten days).
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
        }
    }
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL.as_secs()
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.itinera/config.toml`
    /// 3. `/etc/itinera/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?.ok_or_else(|| {
            ItineraError::Configuration(
                "No config file found. Create ~/.itinera/config.toml or /etc/itinera/config.toml"
                    .to_string(),
            )
        })?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but defaults when no standard file exists.
    ///
    /// An explicit path must still exist.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ItineraError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            ItineraError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero durations and zero attempt limits.
    ///
    /// A zero TTL expires at once in memory but is clamped to one second by
    /// Redis, so the two backends would disagree.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("gemini.timeout_secs", self.gemini.timeout_secs),
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("otp.ttl_secs", self.otp.ttl_secs),
            ("otp.cooldown_secs", self.otp.cooldown_secs),
            ("session.ttl_secs", self.session.ttl_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(ItineraError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let windows = [
            ("limits.gemini", self.limits.gemini),
            ("limits.login", self.limits.login),
            ("limits.forget_password", self.limits.forget_password),
            ("limits.otp_resend", self.limits.otp_resend),
        ];
        for (name, policy) in windows {
            if policy.window_secs == 0 {
                return Err(ItineraError::Configuration(format!(
                    "{name}.window_secs must be greater than zero"
                )));
            }
            if policy.max_attempts == 0 {
                return Err(ItineraError::Configuration(format!(
                    "{name}.max_attempts must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ItineraError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = Path::new(SYSTEM_DIR).join("config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            timeout: Duration::from_secs(self.gemini.timeout_secs),
            quota: self.limits.gemini,
            retry: self.retry.clone(),
        }
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            ttl: Duration::from_secs(self.otp.ttl_secs),
            cooldown: Duration::from_secs(self.otp.cooldown_secs),
            resend: self.limits.otp_resend,
        }
    }

    pub fn account_limits(&self) -> AccountLimits {
        AccountLimits {
            login: self.limits.login,
            forget_password: self.limits.forget_password,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    pub fn mail_sender(&self) -> Sender {
        Sender {
            name: self.mail.sender_name.clone(),
            email: self.mail.sender_email.clone(),
        }
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
    #[serde(default)]
    pub brevo: Option<ApiKeySecret>,
    #[serde(default)]
    pub session: Option<SessionSecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Signing secret of session tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSecret {
    pub secret: String,
}

const SESSION_SECRET_ENV_VAR: &str = "ITINERA_SESSION_SECRET";

/// Service name → environment variable name mapping.
const SERVICE_ENV_VARS: &[(&str, &str)] = &[
    ("gemini", "GEMINI_API_KEY"),
    ("brevo", "BREVO_API_KEY"),
];

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(CONFIG_DIR).join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = Path::new(SYSTEM_DIR).join("secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file. Its permissions must be 0600 or 0400.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            ItineraError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ItineraError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            ItineraError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(ItineraError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a service, falling back to its environment variable.
    pub fn api_key(&self, service: &str) -> Option<String> {
        let from_file = match service {
            "gemini" => self.gemini.as_ref(),
            "brevo" => self.brevo.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            SERVICE_ENV_VARS
                .iter()
                .find(|(name, _)| *name == service)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
        })
    }

    /// Session signing secret, falling back to `ITINERA_SESSION_SECRET`.
    pub fn session_secret(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| s.secret.clone())
            .or_else(|| std::env::var(SESSION_SECRET_ENV_VAR).ok())
            .filter(|secret| !secret.is_empty())
    }
}
