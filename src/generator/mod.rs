pub mod compressor;
pub mod context;
pub mod decomposer;
pub mod dedup;
pub mod outlet;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod role;
pub mod types;
pub mod workflow;
