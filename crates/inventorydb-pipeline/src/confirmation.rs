use async_trait::async_trait;

/// Rejections allowed before a confirmation loop gives up.
pub const DEFAULT_MAX_EDITS: u32 = 10;

/// How the orchestrator treats the refined prompt before synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// Refined prompt goes straight to synthesis.
    #[default]
    Linear,
    /// A reviewer accepts or rejects each refined prompt.
    HumanInTheLoop { max_edits: u32 },
}

impl ConfirmationMode {
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationMode::Linear => "linear",
            ConfirmationMode::HumanInTheLoop { .. } => "human_in_the_loop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Accept,
    Reject { feedback: String },
}

/// Decides whether a refined prompt may proceed to synthesis.
#[async_trait]
pub trait ConfirmationReviewer: Send + Sync {
    /// `edits_so_far` counts earlier rejections in this request.
    async fn review(&self, improved_prompt: &str, edits_so_far: u32) -> Review;
}
