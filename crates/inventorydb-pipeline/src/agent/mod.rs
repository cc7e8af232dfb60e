//! Agent Loop Orchestrator.
//!
//! `Agent ⇄ Tools → End`, with at most [`MAX_ITERATIONS`] agent turns. The
//! model picks the order of schema fetches and query executions; the loop
//! bounds how many times it may do so.

pub mod tools;

use inventorydb_core::PipelineError;
use inventorydb_llm::{ChatMessage, Role, ToolCall};
use serde::Serialize;
use tracing::Instrument;

use crate::insights;
use crate::prompts::AGENT_SYSTEM;
use crate::services::Services;
use crate::shaper::shape;
use crate::state::{PipelineState, StageDelta};

pub const MAX_ITERATIONS: u32 = 5;

pub const ITERATION_LIMIT_NOTICE: &str =
    "Iteration limit reached. The agent stopped before running the remaining tool calls.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentNode {
    Agent,
    Tools,
    End,
}

/// Pipeline state plus the conversation that drove it.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    pipeline: PipelineState,
    messages: Vec<ChatMessage>,
    iteration_count: u32,
    final_answer: Option<String>,
    forced_stop: bool,
}

impl AgentState {
    fn new(user_request: &str, display_cap: usize) -> Self {
        Self {
            pipeline: PipelineState::new(user_request, display_cap),
            messages: vec![ChatMessage::system(AGENT_SYSTEM), ChatMessage::user(user_request)],
            iteration_count: 0,
            final_answer: None,
            forced_stop: false,
        }
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Last non-empty text the model produced.
    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// True when the loop ended with tool calls still pending.
    pub fn forced_stop(&self) -> bool {
        self.forced_stop
    }

    fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.messages
            .last()
            .filter(|message| message.role == Role::Assistant)
            .map(|message| message.tool_calls.clone())
            .unwrap_or_default()
    }
}

/// Bounded tool-calling loop over the same services as [`crate::Pipeline`].
#[derive(Clone)]
pub struct AgentLoop {
    services: Services,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub async fn run(&self, user_request: &str, display_cap: usize) -> AgentState {
        let mut state = AgentState::new(user_request, display_cap);
        let span = tracing::info_span!(
            "agent_request",
            request_id = %state.pipeline.request_id()
        );
        self.drive(&mut state).instrument(span).await;
        state
    }

    async fn drive(&self, state: &mut AgentState) {
        let tool_specs = tools::specs();
        let mut node = AgentNode::Agent;

        while node != AgentNode::End {
            node = match node {
                AgentNode::Agent => self.agent_turn(state, &tool_specs).await,
                AgentNode::Tools => self.tools_turn(state).await,
                AgentNode::End => AgentNode::End,
            };
        }

        self.finish(state).await;
        tracing::info!(
            event = "agent_finished",
            iterations = state.iteration_count,
            forced_stop = state.forced_stop,
            ok = state.pipeline.error().is_none()
        );
    }

    async fn agent_turn(&self, state: &mut AgentState, tool_specs: &[inventorydb_llm::ToolSpec]) -> AgentNode {
        let turn = match self.services.gateway.chat(&state.messages, tool_specs).await {
            Ok(turn) => turn,
            Err(err) => {
                state
                    .pipeline
                    .apply(StageDelta::failed(PipelineError::Agent(err.user_message())));
                return AgentNode::End;
            }
        };

        state.iteration_count += 1;
        let wants_tools = turn.has_tool_calls();
        if !turn.content.trim().is_empty() {
            state.final_answer = Some(turn.content.trim().to_string());
        }
        tracing::info!(
            event = "agent_turn",
            iteration = state.iteration_count,
            tool_calls = turn.tool_calls.len()
        );
        state.messages.push(ChatMessage::assistant(turn));

        if !wants_tools {
            return AgentNode::End;
        }
        if state.iteration_count >= self.max_iterations {
            tracing::warn!(event = "agent_iteration_limit", iterations = state.iteration_count);
            state.messages.push(ChatMessage::system(ITERATION_LIMIT_NOTICE));
            state.forced_stop = true;
            return AgentNode::End;
        }
        AgentNode::Tools
    }

    async fn tools_turn(&self, state: &mut AgentState) -> AgentNode {
        for call in state.pending_tool_calls() {
            let outcome = tools::dispatch(&call, &state.pipeline, &self.services).await;
            state.messages.push(outcome.message);
            state.pipeline.apply(outcome.delta);
        }
        AgentNode::Agent
    }

    /// Shape the last successful result and run the insight engine on it.
    async fn finish(&self, state: &mut AgentState) {
        if state.pipeline.error().is_some() {
            return;
        }
        let Some(rows) = state.pipeline.query_results() else {
            return;
        };

        let (display, metadata) = shape(
            rows,
            state.pipeline.total_rows(),
            state.pipeline.display_cap(),
            state.pipeline.execution_time(),
        );
        state.pipeline.apply(StageDelta::shaped(display, metadata));

        let text = insights::maybe_generate(
            &self.services.gateway,
            state.pipeline.user_input(),
            state.pipeline.query_results(),
            state.pipeline.total_rows(),
        )
        .await;
        state.pipeline.apply(StageDelta::insights(text));
    }
}
