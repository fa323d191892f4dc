//! Trip planning on top of the generative model.
//!
//! Both operations run the same pipeline:
//!
//! 1. derive the cache key from the normalized request;
//! 2. return the cached response on a hit (no quota, no model call);
//! 3. on a miss, admit one unit of the global model quota;
//! 4. call the model under a timeout;
//! 5. decode and validate the typed response;
//! 6. cache it for 24 hours and return it.
//!
//! With retries enabled, steps 3 to 5 repeat per attempt, so every retry
//! pays for its own quota unit.

mod prompts;
pub mod schema;

pub use schema::{BudgetType, FieldExtraction, TripPlan, TripPlanResponse};

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cache::{CacheKey, PlanKeyFields, ResponseCache};
use crate::generative::{self, GenerationRequest, GenerativeService, RetryConfig};
use crate::limit::{self, RateWindow, WindowPolicy};
use crate::store::KeyValueStore;
use crate::telemetry;
use crate::{ItineraError, Result};

/// Default bound on one model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Model,
}

/// A planner response and its origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generated<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Generated<T> {
    pub fn is_cached(&self) -> bool {
        self.source == Source::Cache
    }
}

/// A structured itinerary request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanRequest {
    pub origin: String,
    pub destination: String,
    pub budget: String,
    pub members: u32,
    pub days: u32,
    pub prompt: String,
}

impl PlanRequest {
    /// Every text field must be non-blank; members and days at least 1.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("origin", &self.origin),
            ("destination", &self.destination),
            ("budget", &self.budget),
            ("prompt", &self.prompt),
        ] {
            if value.trim().is_empty() {
                return Err(ItineraError::Validation(format!("{field} is required")));
            }
        }
        if self.members == 0 {
            return Err(ItineraError::Validation("members must be at least 1".to_string()));
        }
        if self.days == 0 {
            return Err(ItineraError::Validation("days must be at least 1".to_string()));
        }
        Ok(())
    }

    fn key_fields(&self) -> PlanKeyFields<'_> {
        PlanKeyFields {
            origin: &self.origin,
            destination: &self.destination,
            budget: &self.budget,
            members: self.members,
            days: self.days,
            prompt: &self.prompt,
        }
    }
}

/// Planner tuning.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Bound on one model call. Default: 30s.
    pub timeout: Duration,
    /// Global model quota. Default: 10 calls per 60s.
    pub quota: WindowPolicy,
    /// Retries of transient failures. Default: none.
    pub retry: RetryConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_MODEL_TIMEOUT,
            quota: limit::GEMINI_QUOTA,
            retry: RetryConfig::default(),
        }
    }
}

/// Field extraction and itinerary generation with caching and quota.
pub struct TripPlanner {
    store: Arc<dyn KeyValueStore>,
    cache: ResponseCache,
    model: Arc<dyn GenerativeService>,
    config: PlannerConfig,
}

impl TripPlanner {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cache: ResponseCache,
        model: Arc<dyn GenerativeService>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            store,
            cache,
            model,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Extract trip fields from free text.
    pub async fn search_field(&self, prompt: &str) -> Result<Generated<FieldExtraction>> {
        if prompt.trim().is_empty() {
            return Err(ItineraError::Validation("prompt is required".to_string()));
        }

        let key = CacheKey::search_field(prompt);
        let request = GenerationRequest::new(
            prompts::EXTRACTION_INSTRUCTION,
            prompts::extraction_prompt(prompt),
        )
        .with_schema(schema::field_extraction_schema());
        self.generate_cached(&key, &request, |_: &FieldExtraction| Ok(()))
            .await
    }

    /// Generate a day-by-day itinerary.
    pub async fn create_plan(&self, plan: &PlanRequest) -> Result<Generated<TripPlanResponse>> {
        plan.validate()?;

        let key = CacheKey::create_plan(&plan.key_fields());
        let request = GenerationRequest::new(
            prompts::tour_guide_instruction(plan.days),
            prompts::plan_prompt(plan),
        )
        .with_schema(schema::trip_plan_schema());
        let days = plan.days;
        self.generate_cached(&key, &request, move |response: &TripPlanResponse| {
            response.validate(days)
        })
        .await
    }

    /// Current value of the global quota counter and the time left in its window.
    pub async fn quota_usage(&self) -> Result<(u64, Option<Duration>)> {
        let window = RateWindow::gemini_quota(self.config.quota);
        let count = self
            .store
            .get(window.key())
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        let remaining = self.store.ttl(window.key()).await?;
        Ok((count, remaining))
    }

    async fn generate_cached<T, V>(
        &self,
        key: &CacheKey,
        request: &GenerationRequest,
        validate: V,
    ) -> Result<Generated<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        V: Fn(&T) -> Result<()> + Sync,
    {
        if let Some(value) = self.cache.get::<T>(key).await? {
            return Ok(Generated {
                value,
                source: Source::Cache,
            });
        }

        let operation = key.operation();
        let value = generative::with_retry(&self.config.retry, operation, || {
            self.call_model(operation, request, &validate)
        })
        .await?;

        if let Err(e) = self.cache.put_default(key, &value).await {
            warn!(key = %key, error = %e, "failed to cache model response");
        }

        Ok(Generated {
            value,
            source: Source::Model,
        })
    }

    /// One quota-admitted, time-bounded, validated model call.
    async fn call_model<T, V>(
        &self,
        operation: &'static str,
        request: &GenerationRequest,
        validate: &V,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<()> + Sync,
    {
        RateWindow::gemini_quota(self.config.quota)
            .admit(self.store.as_ref())
            .await?;

        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.timeout, self.model.generate(request))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ItineraError::Timeout(self.config.timeout)),
        }
        .and_then(schema::decode::<T>)
        .and_then(|value| validate(&value).map(|()| value));
        let elapsed = started.elapsed();

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            telemetry::GENERATIVE_REQUESTS_TOTAL,
            "operation" => operation,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::GENERATIVE_DURATION_SECONDS, "operation" => operation)
            .record(elapsed.as_secs_f64());

        match &result {
            Ok(_) => info!(
                operation,
                model = self.model.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "model call completed"
            ),
            Err(e) => warn!(
                operation,
                model = self.model.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "model call failed"
            ),
        }
        result
    }
}
