//! End-to-end chat pipeline for ragkit

mod coordinator;
mod topic;

pub use coordinator::{ChatOptions, PipelineCoordinator, PipelineStats};
pub use topic::extract_topic;
