//! Builder for the assembled services

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::Itinera;
use crate::auth::session::DEFAULT_SESSION_TTL;
use crate::auth::{
    AccountLimits, AccountService, Argon2Hasher, CredentialHasher, SessionKeys,
};
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::Config;
use crate::generative::GenerativeService;
use crate::mail::MailSender;
use crate::otp::{OtpCoordinator, OtpGenerator, OtpPolicy, RandomOtp};
use crate::planner::{PlannerConfig, TripPlanner};
use crate::plans::{MemoryPlanRepository, PlanRepository, TripPlanService};
use crate::store::{KeyValueStore, MemoryStore};
use crate::users::{MemoryUserDirectory, UserDirectory};
use crate::{ItineraError, Result};

/// Builder for [`Itinera`].
///
/// Only the generative model is mandatory. Everything else defaults to an
/// in-process implementation.
pub struct ItineraBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    model: Option<Arc<dyn GenerativeService>>,
    mailer: Option<Arc<dyn MailSender>>,
    users: Option<Arc<dyn UserDirectory>>,
    plan_repository: Option<Arc<dyn PlanRepository>>,
    hasher: Option<Arc<dyn CredentialHasher>>,
    otp_generator: Option<Arc<dyn OtpGenerator>>,
    sessions: Option<SessionKeys>,
    session_ttl: Duration,
    cache: CacheConfig,
    planner: PlannerConfig,
    otp: OtpPolicy,
    limits: AccountLimits,
}

impl ItineraBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            model: None,
            mailer: None,
            users: None,
            plan_repository: None,
            hasher: None,
            otp_generator: None,
            sessions: None,
            session_ttl: DEFAULT_SESSION_TTL,
            cache: CacheConfig::default(),
            planner: PlannerConfig::default(),
            otp: OtpPolicy::default(),
            limits: AccountLimits::default(),
        }
    }

    /// Apply every tuning section of a loaded config.
    pub fn config(mut self, config: &Config) -> Self {
        self.cache = config.cache_config();
        self.planner = config.planner_config();
        self.otp = config.otp_policy();
        self.limits = config.account_limits();
        self.session_ttl = config.session_ttl();
        self
    }

    /// Shared key-value store (default: in-process).
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Generative model. Required.
    pub fn model(mut self, model: Arc<dyn GenerativeService>) -> Self {
        self.model = Some(model);
        self
    }

    /// Mail sender for OTP codes.
    pub fn mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn plan_repository(mut self, repository: Arc<dyn PlanRepository>) -> Self {
        self.plan_repository = Some(repository);
        self
    }

    /// Credential hasher (default: Argon2).
    pub fn hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// OTP code source (default: random six digits).
    pub fn otp_generator(mut self, generator: Arc<dyn OtpGenerator>) -> Self {
        self.otp_generator = Some(generator);
        self
    }

    /// Session signing keys (default: a random secret with the configured
    /// lifetime, so tokens do not outlive the process).
    pub fn session_keys(mut self, keys: SessionKeys) -> Self {
        self.sessions = Some(keys);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn planner_config(mut self, config: PlannerConfig) -> Self {
        self.planner = config;
        self
    }

    pub fn otp_policy(mut self, policy: OtpPolicy) -> Self {
        self.otp = policy;
        self
    }

    pub fn account_limits(mut self, limits: AccountLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the services.
    pub fn build(self) -> Result<Itinera> {
        let model = self.model.ok_or_else(|| {
            ItineraError::Configuration("no generative model configured".to_string())
        })?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let mailer = self
            .mailer
            .unwrap_or_else(|| Arc::new(UnconfiguredMailer));
        let users = self
            .users
            .unwrap_or_else(|| Arc::new(MemoryUserDirectory::new()));
        let plan_repository = self
            .plan_repository
            .unwrap_or_else(|| Arc::new(MemoryPlanRepository::new()));
        let hasher = self.hasher.unwrap_or_else(|| Arc::new(Argon2Hasher::new()));
        let generator = self.otp_generator.unwrap_or_else(|| Arc::new(RandomOtp));
        let sessions = match self.sessions {
            Some(keys) => keys,
            None => SessionKeys::random(self.session_ttl)?,
        };

        let planner = TripPlanner::new(
            Arc::clone(&store),
            ResponseCache::new(Arc::clone(&store), self.cache),
            model,
            self.planner,
        );
        let otp = Arc::new(OtpCoordinator::new(Arc::clone(&store), generator, self.otp));
        let accounts = AccountService::new(
            users,
            Arc::clone(&store),
            otp,
            mailer,
            hasher,
            sessions,
            self.limits,
        );
        let plans = TripPlanService::new(plan_repository);

        Ok(Itinera::new(store, planner, accounts, plans))
    }
}

impl Default for ItineraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in when no mail sender is configured.
struct UnconfiguredMailer;

#[async_trait]
impl MailSender for UnconfiguredMailer {
    async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Result<()> {
        Err(ItineraError::Configuration(
            "mail delivery is not configured".to_string(),
        ))
    }
}
