use thiserror::Error;

/// Failures talking to the hosted completion service.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("OpenAI client not configured. Check OPENAI_API_KEY.")]
    NotConfigured,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("completion service returned no choices")]
    EmptyResponse,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Fixed sentence safe to show an end user. Library error text stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::NotConfigured => self.to_string(),
            GatewayError::Http(err) if err.is_timeout() => {
                "The language model service did not respond in time.".to_string()
            }
            GatewayError::Http(_) => "The language model service could not be reached.".to_string(),
            GatewayError::Api { status, .. } => {
                format!("The language model service rejected the request (HTTP {status}).")
            }
            GatewayError::EmptyResponse => "The language model returned an empty response.".to_string(),
            GatewayError::Json(_) => "The language model returned an unreadable response.".to_string(),
        }
    }
}


/// Convenience alias for gateway results.
pub type Result<T> = std::result::Result<T, GatewayError>;
