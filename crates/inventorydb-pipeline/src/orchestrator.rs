use std::sync::Arc;

use inventorydb_core::PipelineError;
use inventorydb_sql::{safety, synthesize};
use tracing::Instrument;

use crate::confirmation::{ConfirmationMode, ConfirmationReviewer, Review};
use crate::insights;
use crate::refiner::{Revision, refine};
use crate::services::Services;
use crate::shaper::shape;
use crate::state::{PipelineState, StageDelta};

/// Nodes of the linear pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    SchemaRetrieval,
    PromptRefinement { feedback: Option<String> },
    Confirmation,
    QuerySynthesis,
    Execution,
    ResultShaping,
    InsightGeneration,
    End,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::SchemaRetrieval => "schema_retrieval",
            Stage::PromptRefinement { .. } => "prompt_refinement",
            Stage::Confirmation => "confirmation",
            Stage::QuerySynthesis => "query_synthesis",
            Stage::Execution => "execution",
            Stage::ResultShaping => "result_shaping",
            Stage::InsightGeneration => "insight_generation",
            Stage::End => "end",
        }
    }
}

#[derive(Clone)]
struct Confirmation {
    reviewer: Arc<dyn ConfirmationReviewer>,
    max_edits: u32,
}

/// Pipeline Orchestrator.
///
/// One instance can serve many concurrent requests; all per-request data
/// lives in the [`PipelineState`] created by [`Pipeline::run`].
#[derive(Clone)]
pub struct Pipeline {
    services: Services,
    confirmation: Option<Confirmation>,
}

impl Pipeline {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            confirmation: None,
        }
    }

    /// Insert a review step after refinement. Each rejection sends the
    /// request back to refinement; the `max_edits`-th rejection is fatal.
    pub fn with_confirmation(mut self, reviewer: Arc<dyn ConfirmationReviewer>, max_edits: u32) -> Self {
        self.confirmation = Some(Confirmation { reviewer, max_edits });
        self
    }

    pub fn mode(&self) -> ConfirmationMode {
        match &self.confirmation {
            Some(confirmation) => ConfirmationMode::HumanInTheLoop {
                max_edits: confirmation.max_edits,
            },
            None => ConfirmationMode::Linear,
        }
    }

    /// Run one request to completion or to its first fatal error.
    pub async fn run(&self, user_request: &str, display_cap: usize) -> PipelineState {
        let mut state = PipelineState::new(user_request, display_cap);
        let span = tracing::info_span!(
            "request",
            request_id = %state.request_id(),
            mode = self.mode().label()
        );
        self.drive(&mut state).instrument(span).await;
        state
    }

    async fn drive(&self, state: &mut PipelineState) {
        tracing::info!(
            event = "pipeline_started",
            input_chars = state.user_input().len(),
            display_cap = state.display_cap()
        );

        let mut stage = Stage::SchemaRetrieval;
        while stage != Stage::End {
            tracing::debug!(event = "stage_entered", stage = stage.name());
            let (delta, next) = self.step(&stage, state).await;
            state.apply(delta);

            if let Some(error) = state.error() {
                tracing::warn!(
                    event = "pipeline_halted",
                    stage = stage.name(),
                    kind = error.kind(),
                    error = %error
                );
                break;
            }
            stage = next;
        }

        tracing::info!(
            event = "pipeline_finished",
            ok = state.error().is_none(),
            total_rows = state.total_rows(),
            edits = state.edit_count()
        );
    }

    /// Run one stage against a read-only snapshot and name the next stage.
    async fn step(&self, stage: &Stage, state: &PipelineState) -> (StageDelta, Stage) {
        match stage {
            Stage::SchemaRetrieval => self.retrieve_schema().await,
            Stage::PromptRefinement { feedback } => self.refine_prompt(state, feedback.as_deref()).await,
            Stage::Confirmation => self.confirm(state).await,
            Stage::QuerySynthesis => self.synthesize_query(state).await,
            Stage::Execution => self.execute(state).await,
            Stage::ResultShaping => shape_results(state),
            Stage::InsightGeneration => {
                let text = insights::maybe_generate(
                    &self.services.gateway,
                    state.user_input(),
                    state.query_results(),
                    state.total_rows(),
                )
                .await;
                (StageDelta::insights(text), Stage::End)
            }
            Stage::End => (StageDelta::none(), Stage::End),
        }
    }

    async fn retrieve_schema(&self) -> (StageDelta, Stage) {
        match self.services.schema.fetch().await {
            Ok(schema) => {
                tracing::info!(
                    event = "schema_retrieved",
                    engine = self.services.schema.engine(),
                    tables = schema.tables.len()
                );
                (
                    StageDelta::schema(schema),
                    Stage::PromptRefinement { feedback: None },
                )
            }
            Err(err) => {
                tracing::error!(event = "schema_failed", error = %err);
                (
                    StageDelta::failed(PipelineError::Schema(err.user_message())),
                    Stage::End,
                )
            }
        }
    }

    async fn refine_prompt(&self, state: &PipelineState, feedback: Option<&str>) -> (StageDelta, Stage) {
        let Some(schema) = state.schema() else {
            return missing("schema", PipelineError::Refinement);
        };
        let revision = match (state.improved_prompt(), feedback) {
            (Some(previous), Some(feedback)) => Some(Revision { previous, feedback }),
            _ => None,
        };

        match refine(&self.services.gateway, state.user_input(), schema, revision).await {
            Ok(prompt) => {
                let next = if self.confirmation.is_some() {
                    Stage::Confirmation
                } else {
                    Stage::QuerySynthesis
                };
                (StageDelta::refined(prompt), next)
            }
            Err(err) => (StageDelta::failed(err), Stage::End),
        }
    }

    async fn confirm(&self, state: &PipelineState) -> (StageDelta, Stage) {
        let Some(confirmation) = &self.confirmation else {
            return (StageDelta::none(), Stage::QuerySynthesis);
        };
        let Some(prompt) = state.improved_prompt() else {
            return missing("improved prompt", PipelineError::Refinement);
        };

        match confirmation.reviewer.review(prompt, state.edit_count()).await {
            Review::Accept => {
                tracing::info!(event = "prompt_confirmed", edits = state.edit_count());
                (StageDelta::none(), Stage::QuerySynthesis)
            }
            Review::Reject { feedback } => {
                let edits = state.edit_count() + 1;
                tracing::info!(event = "prompt_rejected", edits, max_edits = confirmation.max_edits);
                if edits >= confirmation.max_edits {
                    let delta = StageDelta::edited(edits)
                        .with_error(PipelineError::EditLimitReached { attempts: edits });
                    return (delta, Stage::End);
                }
                (
                    StageDelta::edited(edits),
                    Stage::PromptRefinement {
                        feedback: Some(feedback),
                    },
                )
            }
        }
    }

    async fn synthesize_query(&self, state: &PipelineState) -> (StageDelta, Stage) {
        let (Some(schema), Some(instruction)) = (state.schema(), state.improved_prompt()) else {
            return missing("improved prompt", PipelineError::Synthesis);
        };

        let candidate = match synthesize(&self.services.gateway, instruction, schema).await {
            Ok(candidate) => candidate,
            Err(err) => return (StageDelta::rejected_sql(None, err), Stage::End),
        };

        // Independent gate, whatever the synthesizer concluded.
        let verdict = safety::validate(&candidate.sql);
        match verdict.into_result() {
            Ok(()) => (StageDelta::accepted_sql(candidate.sql), Stage::Execution),
            Err(reason) => (
                StageDelta::rejected_sql(Some(candidate.sql), PipelineError::Validation(reason)),
                Stage::End,
            ),
        }
    }

    async fn execute(&self, state: &PipelineState) -> (StageDelta, Stage) {
        let Some(sql) = state.sql_query().filter(|_| state.sql_valid()) else {
            return missing("validated query", PipelineError::Validation);
        };

        match self
            .services
            .executor
            .execute(sql, self.services.query_timeout)
            .await
        {
            Ok(outcome) => {
                let seconds = outcome.elapsed_secs();
                (StageDelta::executed(outcome.rows, seconds), Stage::ResultShaping)
            }
            Err(failure) => (
                StageDelta::execution_failed(PipelineError::Execution(failure)),
                Stage::End,
            ),
        }
    }
}

fn shape_results(state: &PipelineState) -> (StageDelta, Stage) {
    let empty = inventorydb_core::ResultSet::default();
    let rows = state.query_results().unwrap_or(&empty);
    let (display, metadata) = shape(rows, state.total_rows(), state.display_cap(), state.execution_time());
    tracing::info!(
        event = "results_shaped",
        displayed_rows = metadata.displayed_rows,
        total_rows = metadata.total_rows,
        capped = metadata.capped
    );
    (StageDelta::shaped(display, metadata), Stage::InsightGeneration)
}

/// A stage ran without its input. Only reachable through a wiring bug.
fn missing(what: &str, error: fn(String) -> PipelineError) -> (StageDelta, Stage) {
    tracing::error!(event = "stage_input_missing", input = what);
    (
        StageDelta::failed(error(format!("internal error: no {what} available"))),
        Stage::End,
    )
}
