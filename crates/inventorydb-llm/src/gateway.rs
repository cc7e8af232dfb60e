use std::sync::Arc;

use crate::error::Result;
use crate::message::{AssistantTurn, ChatMessage, ToolSpec};
use crate::model::{LanguageModel, ModelSettings, UnconfiguredModel};

/// Prefix marking a failed completion.
pub const ERROR_PREFIX: &str = "ERROR:";

/// True when a completion reply reports a failure instead of a result.
pub fn is_error_reply(reply: &str) -> bool {
    reply.trim_start().starts_with(ERROR_PREFIX)
}

/// Shared, read-only handle to the completion service.
#[derive(Clone)]
pub struct Gateway {
    model: Arc<dyn LanguageModel>,
    settings: ModelSettings,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(model: Arc<dyn LanguageModel>, settings: ModelSettings) -> Self {
        Self { model, settings }
    }

    /// Gateway whose every call fails with the "not configured" message.
    pub fn unconfigured(settings: ModelSettings) -> Self {
        Self::new(Arc::new(UnconfiguredModel), settings)
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Completion with the configured model and temperature.
    pub async fn complete(&self, system: &str, user: &str) -> String {
        let settings = self.settings.clone();
        self.complete_with(system, user, &settings).await
    }

    /// Completion with explicit settings. Never fails: errors become
    /// `ERROR: <reason>` replies.
    pub async fn complete_with(&self, system: &str, user: &str, settings: &ModelSettings) -> String {
        match self.model.complete(system, user, settings).await {
            Ok(reply) => reply.trim().to_string(),
            Err(err) => {
                tracing::error!(event = "llm_call_failed", model = %settings.model, error = %err);
                format!("{ERROR_PREFIX} {}", err.user_message())
            }
        }
    }

    /// Tool-calling turn. Unlike `complete`, failures are returned as errors.
    pub async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<AssistantTurn> {
        let turn = self.model.chat(messages, tools, &self.settings).await;
        if let Err(err) = &turn {
            tracing::error!(event = "llm_chat_failed", model = %self.settings.model, error = %err);
        }
        turn
    }
}
