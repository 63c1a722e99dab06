use crate::vision_provider::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solarscope_core::{InferenceConfig, RooftopImage};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Vision provider speaking the OpenAI Chat Completions format (OpenRouter, LM Studio, vLLM, ...)
pub struct OpenAICompatibleVisionProvider {
    config: InferenceConfig,
    client: Client,
    provider_name: String,
    retry_base_delay: Duration,
}

impl OpenAICompatibleVisionProvider {
    /// Create a new provider; the timeout applies to each whole request
    pub fn new(config: InferenceConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        let provider_name = if config.base_url.contains("openrouter.ai") {
            "openrouter"
        } else {
            "openai-compatible"
        }
        .to_string();

        Ok(Self {
            config,
            client,
            provider_name,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay (doubles on every further attempt)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Send a request with retry logic
    async fn send_request(
        &self,
        request: &ChatCompletionsRequest,
    ) -> ProviderResult<ChatCompletionsResponse> {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = self
                    .retry_base_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.try_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    warn!(
                        "{} request failed (attempt {}/{}), retrying: {}",
                        self.provider_name,
                        attempt + 1,
                        self.config.max_retries + 1,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Try a single Chat Completions request
    async fn try_request(
        &self,
        request: &ChatCompletionsRequest,
    ) -> ProviderResult<ChatCompletionsResponse> {
        let endpoint = self.endpoint();

        let mut request_builder = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(request);

        if let Some(api_key) = &self.config.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Some(app_url) = &self.config.app_url {
            request_builder = request_builder.header("HTTP-Referer", app_url);
        }
        if let Some(app_title) = &self.config.app_title {
            request_builder = request_builder.header("X-Title", app_title);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(&endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(&endpoint, e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: self.provider_name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidEnvelope(format!(
                "failed to parse {} Chat Completions response: {}",
                self.provider_name, e
            ))
        })
    }

    fn map_reqwest_error(&self, endpoint: &str, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.config.timeout_secs)
        } else {
            ProviderError::Transport {
                endpoint: endpoint.to_string(),
                message: error.to_string(),
            }
        }
    }

    fn build_request(&self, instruction: &str, image: &RooftopImage) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: instruction.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                        },
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAICompatibleVisionProvider {
    async fn analyze_image(
        &self,
        instruction: &str,
        image: &RooftopImage,
    ) -> ProviderResult<VisionResponse> {
        let request = self.build_request(instruction, image);
        let start = Instant::now();

        let response = self.send_request(&request).await?;

        debug!(
            "{} answered in {}ms",
            self.provider_name,
            start.elapsed().as_millis()
        );

        if let Some(error) = response.error {
            return Err(ProviderError::InvalidEnvelope(format!(
                "provider returned an error payload: {}",
                error
            )));
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidEnvelope("no choices in response".to_string()))?;

        let content = choice.message.content.ok_or_else(|| {
            ProviderError::InvalidEnvelope("choices[0].message.content is missing".to_string())
        })?;

        Ok(VisionResponse {
            content,
            model: response.model.unwrap_or_else(|| self.config.model.clone()),
            finish_reason: choice.finish_reason,
            total_tokens: response.usage.map(|u| u.total_tokens),
        })
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// API request/response types for Chat Completions API

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: usize,
}
