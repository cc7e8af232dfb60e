//! Request orchestration: the linear pipeline, its confirmation-loop
//! configuration, and the bounded agent loop.
//!
//! Every request owns one [`PipelineState`]. Stages never mutate it directly;
//! they return a [`StageDelta`] that the orchestrator merges, and a recorded
//! error is never overwritten.

pub mod agent;
pub mod confirmation;
pub mod insights;
pub mod orchestrator;
pub mod prompts;
pub mod refiner;
pub mod services;
pub mod shaper;
pub mod state;

pub use agent::{AgentLoop, AgentNode, AgentState, ITERATION_LIMIT_NOTICE, MAX_ITERATIONS};
pub use confirmation::{ConfirmationMode, ConfirmationReviewer, DEFAULT_MAX_EDITS, Review};
pub use insights::{EMPTY_RESULT_FALLBACK, INSIGHT_KEYWORDS, maybe_generate, should_generate};
pub use orchestrator::{Pipeline, Stage};
pub use refiner::{Revision, refine};
pub use services::Services;
pub use shaper::{EMPTY_RESULT_MESSAGE, shape};
pub use state::{PipelineState, ResultMetadata, StageDelta};
