//! Service assembly.
//!
//! [`Itinera`] owns one instance of every service, all sharing the same
//! key-value store. Build it with [`Itinera::builder`] for full control or
//! [`Itinera::from_config`] for the production wiring.

mod builder;

pub use builder::ItineraBuilder;

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AccountService, SessionKeys};
use crate::config::{Config, Secrets};
use crate::generative::GeminiClient;
use crate::mail::BrevoMailer;
use crate::planner::TripPlanner;
use crate::plans::TripPlanService;
use crate::store::{KeyValueStore, RedisStore};
use crate::{ItineraError, Result};

/// The assembled services.
pub struct Itinera {
    store: Arc<dyn KeyValueStore>,
    planner: TripPlanner,
    accounts: AccountService,
    plans: TripPlanService,
}

impl Itinera {
    /// Create a new builder for configuring the services.
    pub fn builder() -> ItineraBuilder {
        ItineraBuilder::new()
    }

    /// Production wiring: Redis (when configured), Gemini and Brevo.
    ///
    /// The Gemini key is required. Without a Brevo key the account flows
    /// fail at the mail step.
    pub async fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let mut builder = Self::builder().config(config);

        if let Some(url) = &config.store.redis_url {
            builder = builder.store(Arc::new(RedisStore::connect(url).await?));
        }

        let gemini_key = secrets.api_key("gemini").ok_or_else(|| {
            ItineraError::Configuration(
                "no Gemini API key: set [gemini] in secrets.toml or GEMINI_API_KEY".to_string(),
            )
        })?;
        let gemini = GeminiClient::with_base_url(gemini_key, &config.gemini.base_url)?
            .with_model(&config.gemini.model);
        builder = builder.model(Arc::new(gemini));

        match secrets.session_secret() {
            Some(secret) => {
                let keys = SessionKeys::new(secret.as_bytes(), config.session_ttl())?;
                builder = builder.session_keys(keys);
            }
            None => warn!("no session secret configured, sessions end with the process"),
        }

        match secrets.api_key("brevo") {
            Some(key) => {
                let mailer =
                    BrevoMailer::with_base_url(key, config.mail_sender(), &config.mail.base_url)?;
                builder = builder.mailer(Arc::new(mailer));
            }
            None => warn!("no Brevo API key configured, mail delivery is disabled"),
        }

        builder.build()
    }

    fn new(
        store: Arc<dyn KeyValueStore>,
        planner: TripPlanner,
        accounts: AccountService,
        plans: TripPlanService,
    ) -> Self {
        info!(store = store.name(), "itinera services ready");
        Self {
            store,
            planner,
            accounts,
            plans,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn planner(&self) -> &TripPlanner {
        &self.planner
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn plans(&self) -> &TripPlanService {
        &self.plans
    }
}
