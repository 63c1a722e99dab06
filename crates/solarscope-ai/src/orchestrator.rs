//! Rooftop analysis pipeline: image → vision model → normalized record.
//!
//! The pipeline fails open. A missing image, an unreachable endpoint, a
//! non-success status or an unparsable answer all end in the placeholder
//! record with a diagnostic, never in an error for the caller.

use crate::openai_compatible_provider::OpenAICompatibleVisionProvider;
use crate::vision_provider::{ProviderResult, VisionProvider};
use solarscope_core::normalizer::normalize_with_source;
use solarscope_core::{
    AnalysisOutcome, InferenceConfig, RooftopAnalysis, RooftopImage, SolarParameters, SolarReport,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Fixed instruction sent with every image.
pub const ROOFTOP_INSTRUCTION: &str = "Analyze this rooftop image for solar potential. \
Respond ONLY with valid JSON, no explanation, with these keys: \
area_m2, orientation_deg, shading_percent, obstructions.";

pub struct AnalysisOrchestrator {
    provider: Arc<dyn VisionProvider>,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn VisionProvider>) -> Self {
        Self { provider }
    }

    /// Orchestrator backed by an OpenAI-compatible endpoint
    pub fn from_config(config: &InferenceConfig) -> ProviderResult<Self> {
        let provider = OpenAICompatibleVisionProvider::new(config.clone())?;
        Ok(Self::new(Arc::new(provider)))
    }

    pub async fn analyze(&self, image: Option<&RooftopImage>) -> RooftopAnalysis {
        self.analyze_with_source(image).await.analysis
    }

    pub async fn analyze_with_source(&self, image: Option<&RooftopImage>) -> AnalysisOutcome {
        let Some(image) = image else {
            info!("No image supplied, using placeholder rooftop data");
            return AnalysisOutcome::placeholder("no image supplied");
        };

        info!(
            "Analyzing {} image ({} bytes) with {} / {}",
            image.format(),
            image.size_bytes(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        match self
            .provider
            .analyze_image(ROOFTOP_INSTRUCTION, image)
            .await
        {
            Ok(response) => {
                debug!("Raw model response: {}", response.content);
                normalize_with_source(&response.content)
            }
            Err(e) => {
                error!("Rooftop analysis request failed: {}", e);
                AnalysisOutcome::placeholder(format!("analysis request failed: {}", e))
            }
        }
    }

    /// Analyze and derive energy, cost and recommendations in one go.
    pub async fn report(
        &self,
        image: Option<&RooftopImage>,
        params: &SolarParameters,
    ) -> SolarReport {
        let outcome = self.analyze_with_source(image).await;
        SolarReport::build(outcome, params)
    }
}
