//! Core pipeline orchestration and domain logic for LeadEnrich.
//!
//! This crate ties the places client, website profiler and text generator
//! into enrichment stages, and drives them over a lead table end to end
//! (see [`Pipeline::run`]).

pub mod email;
pub mod generation;
pub mod pipeline;
pub mod profile;
pub mod reviews;
pub mod sink;
pub mod stage;

#[cfg(test)]
mod testing;

pub use email::{DEFAULT_PROMPT_TEMPLATE, GeneratedEmailStage};
pub use generation::{ChatCompletionsClient, TextGenerator};
pub use pipeline::{
    EmailOptions, MergeSummary, Pipeline, PipelineOptions, RunPlan, RunReport, SearchRequest,
    TableSource,
};
pub use profile::WebsiteProfileStage;
pub use reviews::ReviewsStage;
pub use sink::ErrorSink;
pub use stage::{EnrichmentStage, ProgressReporter, RowOutcome, SilentProgress, StageReport, run_stage};
