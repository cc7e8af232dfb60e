use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::message::{AssistantTurn, ChatMessage, ToolSpec};

pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Model identifier and sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// A hosted text-completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single system + user exchange returning the reply text.
    async fn complete(&self, system: &str, user: &str, settings: &ModelSettings) -> Result<String>;

    /// Full-history turn with a toolset; the reply may request tool calls.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        settings: &ModelSettings,
    ) -> Result<AssistantTurn>;
}

/// Stand-in used when no API credential is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredModel;

#[async_trait]
impl LanguageModel for UnconfiguredModel {
    async fn complete(&self, _system: &str, _user: &str, _settings: &ModelSettings) -> Result<String> {
        Err(GatewayError::NotConfigured)
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
        _settings: &ModelSettings,
    ) -> Result<AssistantTurn> {
        Err(GatewayError::NotConfigured)
    }
}
