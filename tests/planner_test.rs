//! Trip planner pipeline tests: cache, quota, timeout, validation, retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use itinera::cache::{CacheConfig, ResponseCache};
use itinera::error::ErrorKind;
use itinera::generative::{GenerationRequest, GenerativeService, RetryConfig};
use itinera::planner::{PlanRequest, PlannerConfig, Source, TripPlanner};
use itinera::store::{KeyValueStore, MemoryStore};
use itinera::{ItineraError, Result};

// ============================================================================
// Mock model
// ============================================================================

type Responder = Box<dyn Fn(usize, &GenerationRequest) -> Result<Value> + Send + Sync>;

/// Counts calls and answers through a closure of (call index, request).
struct MockModel {
    calls: AtomicUsize,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    respond: Responder,
}

impl MockModel {
    fn new(respond: impl Fn(usize, &GenerationRequest) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeService for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.user_prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(n, request)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn plan_json(days: u32) -> Value {
    json!({
        "success": true,
        "plan": {
            "tripName": "Dhaka to Cox's Bazar",
            "totalMembers": 2,
            "budget": "mid",
            "origin": "Dhaka",
            "destination": "Cox's Bazar",
            "days": days,
            "dailyItinerary": (1..=days)
                .map(|d| json!({"day": d, "activities": ["beach walk", {"name": "Inani", "time": "16:00"}]}))
                .collect::<Vec<_>>(),
            "budgetBreakdown": {"totalEstimatedCost": 24000}
        }
    })
}

fn extraction_json() -> Value {
    json!({
        "origin": "Dhaka",
        "destination": "Sylhet",
        "budgetType": "cheap",
        "members": 4,
        "days": 3,
        "originalPrompt": "3 days Dhaka to Sylhet for 4, cheap"
    })
}

fn request(days: u32) -> PlanRequest {
    PlanRequest {
        origin: "Dhaka".to_string(),
        destination: "Cox's Bazar".to_string(),
        budget: "mid".to_string(),
        members: 2,
        days,
        prompt: "beaches and seafood".to_string(),
    }
}

fn planner_with(
    model: Arc<MockModel>,
    config: PlannerConfig,
) -> (Arc<MemoryStore>, TripPlanner) {
    let store = Arc::new(MemoryStore::new());
    let cache = ResponseCache::new(store.clone(), CacheConfig::default());
    let planner = TripPlanner::new(store.clone(), cache, model, config);
    (store, planner)
}

fn planner(model: Arc<MockModel>) -> (Arc<MemoryStore>, TripPlanner) {
    planner_with(model, PlannerConfig::default())
}

async fn quota_count(store: &MemoryStore) -> Option<String> {
    store.get("geminiLimit").await.unwrap()
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn second_identical_plan_is_served_from_cache() {
    let model = Arc::new(MockModel::new(|_, _| Ok(plan_json(3))));
    let (store, planner) = planner(model.clone());

    let first = planner.create_plan(&request(3)).await.unwrap();
    assert_eq!(first.source, Source::Model);
    assert_eq!(first.value.plan.daily_itinerary.len(), 3);

    let second = planner.create_plan(&request(3)).await.unwrap();
    assert!(second.is_cached());
    assert_eq!(second.value, first.value);

    assert_eq!(model.calls(), 1);
    assert_eq!(quota_count(&store).await.as_deref(), Some("1"));
}

#[tokio::test]
async fn plan_cache_ignores_case_and_whitespace() {
    let model = Arc::new(MockModel::new(|_, _| Ok(plan_json(2))));
    let (_, planner) = planner(model.clone());

    planner.create_plan(&request(2)).await.unwrap();
    let shouted = PlanRequest {
        origin: "  DHAKA ".to_string(),
        destination: "cox's   bazar".to_string(),
        budget: "Mid".to_string(),
        prompt: "Beaches and\tSeafood".to_string(),
        ..request(2)
    };
    assert!(planner.create_plan(&shouted).await.unwrap().is_cached());
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn different_day_counts_are_cached_apart() {
    let model = Arc::new(MockModel::new(|n, _| Ok(plan_json(2 + n as u32))));
    let (_, planner) = planner(model.clone());

    planner.create_plan(&request(2)).await.unwrap();
    let longer = planner.create_plan(&request(3)).await.unwrap();
    assert_eq!(longer.source, Source::Model);
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn search_field_extracts_and_caches() {
    let model = Arc::new(MockModel::new(|_, _| Ok(extraction_json())));
    let (_, planner) = planner(model.clone());

    let first = planner
        .search_field("3 days Dhaka to Sylhet for 4, cheap")
        .await
        .unwrap();
    assert_eq!(first.value.destination.as_deref(), Some("Sylhet"));
    assert_eq!(first.value.members, Some(4));

    let again = planner
        .search_field("  3 DAYS dhaka to sylhet   for 4, cheap ")
        .await
        .unwrap();
    assert!(again.is_cached());
    assert_eq!(model.calls(), 1);

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains("3 days Dhaka to Sylhet for 4, cheap"));
}

#[tokio::test]
async fn requests_carry_response_schemas() {
    let model = Arc::new(MockModel::new(|_, request| {
        let schema = request.response_schema.as_ref().expect("schema attached");
        if schema["properties"].get("plan").is_some() {
            Ok(plan_json(2))
        } else {
            assert!(schema["properties"].get("budgetType").is_some());
            Ok(extraction_json())
        }
    }));
    let (_, planner) = planner(model.clone());

    planner.search_field("Sylhet for 3 days").await.unwrap();
    planner.create_plan(&request(2)).await.unwrap();
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn cached_extraction_serializes_identically() {
    let prompt = "Dhaka to Cox's Bazar for 3 days, 2 people, mid budget";
    let model = Arc::new(MockModel::new(move |_, _| {
        Ok(json!({
            "origin": "Dhaka",
            "destination": "Cox's Bazar",
            "budgetType": "mid",
            "members": 2,
            "days": 3,
            "originalPrompt": prompt
        }))
    }));
    let (store, planner) = planner(model.clone());

    let first = planner.search_field(prompt).await.unwrap();
    let second = planner.search_field(prompt).await.unwrap();

    assert_eq!(first.source, Source::Model);
    assert_eq!(second.source, Source::Cache);
    assert_eq!(
        serde_json::to_string(&first.value).unwrap(),
        serde_json::to_string(&second.value).unwrap()
    );
    assert_eq!(model.calls(), 1);
    assert_eq!(quota_count(&store).await.as_deref(), Some("1"));
}

// ============================================================================
// Validation and schema
// ============================================================================

#[tokio::test]
async fn blank_prompt_is_rejected_before_quota() {
    let model = Arc::new(MockModel::new(|_, _| Ok(extraction_json())));
    let (store, planner) = planner(model.clone());

    let err = planner.search_field("   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = planner
        .create_plan(&PlanRequest {
            days: 0,
            ..request(3)
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(model.calls(), 0);
    assert_eq!(quota_count(&store).await, None);
}

#[tokio::test]
async fn wrong_day_count_is_a_schema_mismatch_and_not_cached() {
    let model = Arc::new(MockModel::new(|_, _| Ok(plan_json(2))));
    let (store, planner) = planner(model.clone());

    let err = planner.create_plan(&request(3)).await.unwrap_err();
    assert!(matches!(err, ItineraError::SchemaMismatch(_)));
    assert_eq!(err.status(), 502);

    planner.create_plan(&request(3)).await.unwrap_err();
    assert_eq!(model.calls(), 2);
    assert_eq!(quota_count(&store).await.as_deref(), Some("2"));
}

#[tokio::test]
async fn undecodable_model_output_is_a_schema_mismatch() {
    let model = Arc::new(MockModel::new(|_, _| Ok(json!({"plan": "nope"}))));
    let (_, planner) = planner(model);

    let err = planner.create_plan(&request(1)).await.unwrap_err();
    assert!(matches!(err, ItineraError::SchemaMismatch(_)));
}

// ============================================================================
// Quota
// ============================================================================

#[tokio::test(start_paused = true)]
async fn eleventh_model_call_in_a_minute_is_rejected() {
    let model = Arc::new(MockModel::new(|_, _| Ok(extraction_json())));
    let (_, planner) = planner(model.clone());

    for i in 0..10 {
        planner
            .search_field(&format!("trip number {i}"))
            .await
            .unwrap();
    }

    let err = planner.search_field("trip number 10").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    let retry_after = err.retry_after().unwrap();
    assert!(retry_after >= Duration::from_secs(1) && retry_after <= Duration::from_secs(60));
    assert_eq!(model.calls(), 10);

    // Cache hits do not need quota.
    assert!(planner.search_field("trip number 3").await.unwrap().is_cached());

    tokio::time::advance(Duration::from_secs(60)).await;
    planner.search_field("trip number 10").await.unwrap();
    assert_eq!(model.calls(), 11);
}

#[tokio::test(start_paused = true)]
async fn quota_usage_reports_counter_and_window() {
    let model = Arc::new(MockModel::new(|_, _| Ok(extraction_json())));
    let (_, planner) = planner(model);

    assert_eq!(planner.quota_usage().await.unwrap(), (0, None));

    planner.search_field("anywhere").await.unwrap();
    let (count, remaining) = planner.quota_usage().await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(remaining, Some(Duration::from_secs(60)));
}

// ============================================================================
// Timeout
// ============================================================================

#[tokio::test(start_paused = true)]
async fn slow_model_times_out_and_keeps_quota_spent() {
    let model = Arc::new(
        MockModel::new(|_, _| Ok(plan_json(3))).slow(Duration::from_secs(31)),
    );
    let (store, planner) = planner(model.clone());

    let err = planner.create_plan(&request(3)).await.unwrap_err();
    assert!(matches!(err, ItineraError::Timeout(d) if d == Duration::from_secs(30)));
    assert_eq!(err.status(), 504);
    assert_eq!(quota_count(&store).await.as_deref(), Some("1"));

    // Nothing was cached.
    let model_calls = model.calls();
    planner.create_plan(&request(3)).await.unwrap_err();
    assert_eq!(model.calls(), model_calls + 1);
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_honoured() {
    let model = Arc::new(
        MockModel::new(|_, _| Ok(extraction_json())).slow(Duration::from_secs(5)),
    );
    let config = PlannerConfig {
        timeout: Duration::from_secs(2),
        ..PlannerConfig::default()
    };
    let (_, planner) = planner_with(model, config);

    let err = planner.search_field("somewhere").await.unwrap_err();
    assert!(matches!(err, ItineraError::Timeout(d) if d == Duration::from_secs(2)));
}

// ============================================================================
// Retries
// ============================================================================

fn retrying() -> PlannerConfig {
    PlannerConfig {
        retry: RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(10))
            .jitter(false),
        ..PlannerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_and_each_attempt_pays_quota() {
    let model = Arc::new(MockModel::new(|n, _| {
        if n == 0 {
            Err(ItineraError::Upstream("connection reset".to_string()))
        } else {
            Ok(plan_json(3))
        }
    }));
    let (store, planner) = planner_with(model.clone(), retrying());

    let plan = planner.create_plan(&request(3)).await.unwrap();
    assert_eq!(plan.source, Source::Model);
    assert_eq!(model.calls(), 2);
    assert_eq!(quota_count(&store).await.as_deref(), Some("2"));
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_not_retried() {
    let model = Arc::new(MockModel::new(|_, _| {
        Err(ItineraError::UpstreamStatus {
            status: 401,
            message: "gemini rejected the API key".to_string(),
            retry_after: None,
        })
    }));
    let (_, planner) = planner_with(model.clone(), retrying());

    let err = planner.search_field("anywhere").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(model.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_when_quota_runs_out() {
    let model = Arc::new(MockModel::new(|_, _| {
        Err(ItineraError::Upstream("overloaded".to_string()))
    }));
    let config = PlannerConfig {
        quota: itinera::WindowPolicy::new(60, 2),
        ..retrying()
    };
    let (_, planner) = planner_with(model.clone(), config);

    let err = planner.search_field("anywhere").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(model.calls(), 2);
}
