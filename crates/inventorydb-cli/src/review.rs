use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use inventorydb_pipeline::{ConfirmationReviewer, Review};

const NO_FEEDBACK: &str = "The user rejected this interpretation without further detail.";

/// Asks the person at the terminal to accept or correct each refined prompt.
#[derive(Debug, Default)]
pub struct TerminalReviewer;

#[async_trait]
impl ConfirmationReviewer for TerminalReviewer {
    async fn review(&self, improved_prompt: &str, edits_so_far: u32) -> Review {
        let prompt = improved_prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || ask(&prompt, edits_so_far)).await;

        match answer {
            Ok(Ok(Some(line))) => parse_review(&line),
            Ok(Ok(None)) => {
                tracing::warn!(event = "review_input_closed");
                Review::Accept
            }
            Ok(Err(err)) => {
                tracing::warn!(event = "review_input_failed", error = %err);
                Review::Accept
            }
            Err(err) => {
                tracing::warn!(event = "review_task_failed", error = %err);
                Review::Accept
            }
        }
    }
}

/// `None` when stdin is closed.
fn ask(improved_prompt: &str, edits_so_far: u32) -> io::Result<Option<String>> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "\nInterpreted as: {improved_prompt}")?;
    if edits_so_far > 0 {
        writeln!(stderr, "(revision {edits_so_far})")?;
    }
    write!(stderr, "Run this? [Y/n, or type a correction]: ")?;
    stderr.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Empty or yes accepts; no rejects; anything else is feedback.
pub fn parse_review(line: &str) -> Review {
    let answer = line.trim();
    match answer.to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Review::Accept,
        "n" | "no" => Review::Reject {
            feedback: NO_FEEDBACK.to_string(),
        },
        _ => Review::Reject {
            feedback: answer.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_map_to_reviews() {
        assert_eq!(parse_review("\n"), Review::Accept);
        assert_eq!(parse_review("Yes\n"), Review::Accept);
        assert_eq!(
            parse_review("n"),
            Review::Reject {
                feedback: NO_FEEDBACK.to_string()
            }
        );
        assert_eq!(
            parse_review("  only active projects\n"),
            Review::Reject {
                feedback: "only active projects".to_string()
            }
        );
    }
}
