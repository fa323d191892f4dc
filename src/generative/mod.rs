//! Generative model access.
//!
//! [`GenerativeService`] is the seam between the trip planner and the model
//! provider. [`GeminiClient`] is the production implementation.

mod gemini;
mod retry;

pub use gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, GeminiClient};
pub use retry::RetryConfig;
pub(crate) use retry::with_retry;

use async_trait::async_trait;

use crate::Result;

/// One structured-output request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction steering the model.
    pub system_instruction: String,
    /// The user turn.
    pub user_prompt: String,
    /// Optional JSON schema the provider should constrain its output to.
    pub response_schema: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(system_instruction: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            user_prompt: user_prompt.into(),
            response_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A model that answers with one JSON document.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Generate a response and parse it as JSON.
    ///
    /// Output that is not JSON fails with `SchemaMismatch`; typed validation
    /// of the document is up to the caller.
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value>;
}
