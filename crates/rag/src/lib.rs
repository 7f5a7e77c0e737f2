//! Retrieval-augmented generation for FireGPT.
//!
//! Composes the knowledge store, prompt definitions, model registry and
//! geodata clients into the two user-facing operations: answering a
//! wildfire question and planning a response to a reported fire.

pub mod pipeline;
pub mod plan;

pub use pipeline::{AskResponse, Location, PipelineOptions, Prompts, RagPipeline};
pub use plan::ActionPlan;
