pub mod text_pipeline;
pub mod translation_orchestrator;

pub use text_pipeline::TextPipeline;
pub use translation_orchestrator::TranslationOrchestrator;
