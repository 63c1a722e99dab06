use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solarscope_core::RooftopImage;
use thiserror::Error;

/// Everything that can go wrong between us and the inference endpoint.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response envelope: {0}")]
    InvalidEnvelope(String),
}

impl ProviderError {
    /// Client errors other than rate limiting won't succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Client(_) | ProviderError::InvalidEnvelope(_) => false,
            ProviderError::Transport { .. } | ProviderError::Timeout(_) => true,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Response from the vision model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionResponse {
    /// Generated text content (expected, not guaranteed, to hold JSON)
    pub content: String,
    /// Model that produced the answer
    pub model: String,
    /// Finish reason (e.g., "stop", "length")
    pub finish_reason: Option<String>,
    /// Total tokens used in the request
    pub total_tokens: Option<usize>,
}

/// A multimodal model that can answer a text instruction about one image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send the instruction and image, returning the model's text answer
    async fn analyze_image(
        &self,
        instruction: &str,
        image: &RooftopImage,
    ) -> ProviderResult<VisionResponse>;

    /// Get the name of this provider
    fn provider_name(&self) -> &str;

    /// Get the model identifier
    fn model_name(&self) -> &str;
}
