use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified execution failure. Messages are user-facing, never raw driver text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFailure {
    #[error("Query exceeded time limit ({seconds}s). Please add filters or narrow your query.")]
    Timeout { seconds: u64 },
    #[error("Permission denied. You don't have access to read from this table.")]
    PermissionDenied,
    #[error("{message}")]
    Generic { message: String },
}

impl ExecutionFailure {
    pub fn generic(message: impl Into<String>) -> Self {
        ExecutionFailure::Generic {
            message: message.into(),
        }
    }
}

/// Fatal errors that halt a request. Insight failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("Schema retrieval failed: {0}")]
    Schema(String),
    #[error("Prompt refinement failed: {0}")]
    Refinement(String),
    /// Model declined or referenced an unknown identifier; shown verbatim.
    #[error("{0}")]
    Synthesis(String),
    #[error("{0}")]
    Validation(String),
    #[error("Query execution failed: {0}")]
    Execution(ExecutionFailure),
    #[error("Agent turn failed: {0}")]
    Agent(String),
    #[error("Maximum edit attempts reached ({attempts}). Please submit a new query.")]
    EditLimitReached { attempts: u32 },
}

impl PipelineError {
    /// Execution failures are transient; callers may retry the whole request.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Execution(_))
    }

    /// Short machine-readable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Schema(_) => "schema",
            PipelineError::Refinement(_) => "refinement",
            PipelineError::Synthesis(_) => "synthesis",
            PipelineError::Validation(_) => "validation",
            PipelineError::Execution(ExecutionFailure::Timeout { .. }) => "execution_timeout",
            PipelineError::Execution(ExecutionFailure::PermissionDenied) => {
                "execution_permission_denied"
            }
            PipelineError::Execution(ExecutionFailure::Generic { .. }) => "execution_generic",
            PipelineError::Agent(_) => "agent",
            PipelineError::EditLimitReached { .. } => "edit_limit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_messages_are_user_facing() {
        let err = PipelineError::Execution(ExecutionFailure::Timeout { seconds: 20 });
        assert_eq!(
            err.to_string(),
            "Query execution failed: Query exceeded time limit (20s). Please add filters or narrow your query."
        );
        assert!(err.is_transient());
        assert_eq!(err.kind(), "execution_timeout");
    }

    #[test]
    fn synthesis_errors_are_verbatim() {
        let err = PipelineError::Synthesis("ERROR: table 'x' not found.".into());
        assert_eq!(err.to_string(), "ERROR: table 'x' not found.");
        assert!(!err.is_transient());
    }
}
