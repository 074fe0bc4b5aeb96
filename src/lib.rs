pub mod cache;
pub mod cli;
pub mod config;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod retrievers;
pub mod scraper;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::context::ResearchContext;
pub use generator::pipeline::Researcher;
pub use generator::types::{
    PipelineError, PipelineStage, ReportType, ResearchError, ResearchOutcome, ResearchRequest,
};
pub use generator::workflow::launch;
