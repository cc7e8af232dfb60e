use inventorydb_core::{PipelineError, SchemaDescriptor};
use inventorydb_llm::{ERROR_PREFIX, Gateway, is_error_reply};

use crate::prompts::REFINER_SYSTEM;

/// A rejected instruction and the reviewer's reason, fed into the next attempt.
#[derive(Debug, Clone, Copy)]
pub struct Revision<'a> {
    pub previous: &'a str,
    pub feedback: &'a str,
}

/// Turn a raw request into a one-to-three sentence instruction.
pub async fn refine(
    gateway: &Gateway,
    raw_request: &str,
    schema: &SchemaDescriptor,
    revision: Option<Revision<'_>>,
) -> Result<String, PipelineError> {
    let mut request = format!(
        "User's request: {raw_request}\n\nDatabase schema:\n{}\n\n",
        schema.to_prompt_json()
    );
    if let Some(revision) = revision {
        request.push_str(&format!(
            "A previous improved prompt was rejected.\nPrevious improved prompt: {}\nReviewer feedback: {}\n\n",
            revision.previous, revision.feedback
        ));
    }
    request.push_str("Improve this prompt for SQL generation.");

    let reply = gateway.complete(REFINER_SYSTEM, &request).await;
    if is_error_reply(&reply) {
        let reason = reply.trim_start().trim_start_matches(ERROR_PREFIX).trim();
        return Err(PipelineError::Refinement(reason.to_string()));
    }
    if reply.trim().is_empty() {
        return Err(PipelineError::Refinement(
            "the model returned an empty instruction".to_string(),
        ));
    }

    tracing::info!(event = "prompt_refined", chars = reply.len());
    Ok(reply.trim().to_string())
}
