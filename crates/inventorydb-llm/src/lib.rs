//! Language Model Gateway.
//!
//! Every component that needs natural-language reasoning goes through
//! [`Gateway`]. Plain completions follow the `ERROR:` reply contract: a
//! transport failure comes back as a string with that prefix instead of an
//! error value, and callers must check [`is_error_reply`] before using it.

pub mod error;
pub mod gateway;
pub mod message;
pub mod model;
pub mod openai;

pub use error::{GatewayError, Result};
pub use gateway::{ERROR_PREFIX, Gateway, is_error_reply};
pub use message::{AssistantTurn, ChatMessage, Role, ToolCall, ToolSpec};
pub use model::{LanguageModel, ModelSettings, UnconfiguredModel};
pub use openai::{DEFAULT_BASE_URL, OpenAiClient};
