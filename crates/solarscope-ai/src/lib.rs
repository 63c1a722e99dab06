pub mod openai_compatible_provider;
pub mod orchestrator;
pub mod vision_provider;

pub use openai_compatible_provider::OpenAICompatibleVisionProvider;
pub use orchestrator::{AnalysisOrchestrator, ROOFTOP_INSTRUCTION};
pub use vision_provider::*;
