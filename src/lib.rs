//! Itinera - AI caching, quota limiting and OTP coordination for trip planning
//!
//! This crate is the core of a travel-planning backend. Generative model
//! calls go through a content-addressed response cache and a global quota;
//! registration and password reset run on expiring OTP records. All three
//! coordinate through one shared [`KeyValueStore`] (Redis in production).
//!
//! # Planning Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use itinera::{GeminiClient, Itinera, PlanRequest};
//!
//! #[tokio::main]
//! async fn main() -> itinera::Result<()> {
//!     let app = Itinera::builder()
//!         .model(Arc::new(GeminiClient::new("your-gemini-key")?))
//!         .build()?;
//!
//!     let fields = app.planner().search_field("3 days from Dhaka to Sylhet").await?;
//!     println!("{:?}", fields.value);
//!
//!     let plan = app
//!         .planner()
//!         .create_plan(&PlanRequest {
//!             origin: "Dhaka".into(),
//!             destination: "Sylhet".into(),
//!             budget: "mid".into(),
//!             members: 2,
//!             days: 3,
//!             prompt: "tea gardens".into(),
//!         })
//!         .await?;
//!     println!("{} days, cached: {}", plan.value.plan.days, plan.is_cached());
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod generative;
pub mod keys;
pub mod limit;
pub mod mail;
pub mod otp;
pub mod planner;
pub mod plans;
pub mod store;
pub mod telemetry;
pub mod users;

// Re-export main types at crate root
pub use app::{Itinera, ItineraBuilder};
pub use error::{ErrorKind, ItineraError, Result};

pub use auth::{AccountService, Argon2Hasher, CredentialHasher, Session, SessionKeys};
pub use cache::{CacheConfig, CacheKey, ResponseCache};
pub use config::{Config, Secrets};
pub use generative::{GeminiClient, GenerationRequest, GenerativeService, RetryConfig};
pub use limit::{Admission, RateWindow, WindowPolicy};
pub use mail::{BrevoMailer, MailSender};
pub use otp::{OtpCoordinator, OtpFlow, OtpGenerator, OtpPolicy, RandomOtp};
pub use planner::{
    FieldExtraction, Generated, PlanRequest, PlannerConfig, Source, TripPlanResponse, TripPlanner,
};
pub use plans::{MemoryPlanRepository, PlanRepository, StoredPlan, TripPlanService};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
pub use users::{MemoryUserDirectory, NewUser, UserDirectory, UserProfile, UserRecord};
