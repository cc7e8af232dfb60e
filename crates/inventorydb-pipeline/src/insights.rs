//! Insight Heuristic Engine.
//!
//! The decision to ask for commentary is made locally; the model is only
//! consulted once the heuristic fires. Failures here never reach
//! `PipelineState::error`.

use inventorydb_core::ResultSet;
use inventorydb_llm::{Gateway, is_error_reply};

use crate::prompts::INSIGHTS_SYSTEM;

pub const INSIGHT_KEYWORDS: &[&str] = &[
    "trend", "compare", "analysis", "insight", "summary", "top", "breakdown", "average", "mean",
    "median", "percent", "total", "count", "over", "under", "exceed", "below",
];

pub const EMPTY_RESULT_FALLBACK: &str = "No data matched your query criteria. This could mean the conditions specified don't apply to any records in the database.";

/// Replies at or below this many characters are treated as no reply.
const MIN_REPLY_CHARS: usize = 10;
const SAMPLE_ROWS: usize = 10;
const NUMERIC_TRIGGER_ROWS: usize = 3;

/// Keyword match on the request, or a numeric column with enough rows.
pub fn should_generate(user_input: &str, rows: &ResultSet, total_rows: usize) -> bool {
    let lowered = user_input.to_lowercase();
    if INSIGHT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        return true;
    }
    total_rows >= NUMERIC_TRIGGER_ROWS && !rows.numeric_columns().is_empty()
}

/// Optional commentary for a finished query.
///
/// An empty result always yields text, falling back to
/// [`EMPTY_RESULT_FALLBACK`] when the model has nothing usable.
pub async fn maybe_generate(
    gateway: &Gateway,
    user_input: &str,
    rows: Option<&ResultSet>,
    total_rows: usize,
) -> Option<String> {
    if total_rows == 0 {
        return Some(explain_empty(gateway, user_input, rows).await);
    }

    let rows = rows?;
    if !should_generate(user_input, rows, total_rows) {
        tracing::debug!(event = "insights_skipped", total_rows);
        return None;
    }

    let request = format!(
        "Original request: {user_input}\n\nQuery results summary:\n{}\n\nGenerate 0-3 concise insights if appropriate.",
        summarize(rows, total_rows)
    );
    let reply = gateway.complete(INSIGHTS_SYSTEM, &request).await;

    if is_error_reply(&reply) {
        tracing::warn!(event = "insights_failed", reply = %reply);
        return None;
    }
    let reply = reply.trim();
    if reply.chars().count() <= MIN_REPLY_CHARS || reply.to_lowercase().contains("no insight") {
        tracing::debug!(event = "insights_discarded", chars = reply.len());
        return None;
    }
    tracing::info!(event = "insights_generated", chars = reply.len());
    Some(reply.to_string())
}

async fn explain_empty(gateway: &Gateway, user_input: &str, rows: Option<&ResultSet>) -> String {
    let columns = rows
        .filter(|rows| !rows.columns.is_empty())
        .map(|rows| rows.column_names().join(", "))
        .unwrap_or_else(|| "N/A".to_string());
    let request = format!(
        "Original request: {user_input}\n\nQuery returned 0 rows (empty result set).\nColumns that would have been returned: {columns}\n\nExplain what this empty result means in the context of the user's question."
    );

    let reply = gateway.complete(INSIGHTS_SYSTEM, &request).await;
    let reply = reply.trim();
    if is_error_reply(reply) || reply.chars().count() <= MIN_REPLY_CHARS {
        tracing::warn!(event = "empty_result_fallback");
        return EMPTY_RESULT_FALLBACK.to_string();
    }
    reply.to_string()
}

/// Row/column counts, a sample of rows and per-column numeric stats.
fn summarize(rows: &ResultSet, total_rows: usize) -> String {
    let numeric = rows.numeric_columns();
    let stats = if numeric.is_empty() {
        "No numeric columns".to_string()
    } else {
        numeric
            .iter()
            .filter_map(|&idx| {
                let stats = rows.numeric_stats(idx)?;
                Some(format!(
                    "{}: count={}, mean={:.2}, min={}, max={}",
                    rows.columns[idx].name, stats.count, stats.mean, stats.min, stats.max
                ))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Result has {total_rows} rows and columns: {}\n\nFirst {SAMPLE_ROWS} rows:\n{}\n\nBasic stats for numeric columns:\n{stats}",
        rows.column_names().join(", "),
        rows.format_table(SAMPLE_ROWS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventorydb_core::{CellValue, ColumnHeader};

    fn names(n: usize) -> ResultSet {
        ResultSet::new(
            vec![ColumnHeader::new("project_name", "TEXT")],
            (0..n).map(|i| vec![CellValue::Text(format!("p{i}"))]).collect(),
        )
    }

    fn budgets(n: usize) -> ResultSet {
        ResultSet::new(
            vec![
                ColumnHeader::new("project_name", "TEXT"),
                ColumnHeader::new("budget", "NUMERIC"),
            ],
            (0..n)
                .map(|i| vec![CellValue::Text(format!("p{i}")), CellValue::Float(i as f64 * 10.0)])
                .collect(),
        )
    }

    #[test]
    fn keywords_trigger_regardless_of_shape() {
        assert!(should_generate("Compare budgets by client", &names(1), 1));
        assert!(should_generate("TOTAL orders", &names(1), 1));
    }

    #[test]
    fn numeric_columns_need_three_rows() {
        assert!(!should_generate("show projects", &budgets(2), 2));
        assert!(should_generate("show projects", &budgets(3), 3));
        assert!(!should_generate("show projects", &names(50), 50));
    }

    #[test]
    fn summary_carries_sample_and_stats() {
        let summary = summarize(&budgets(12), 12);
        assert!(summary.starts_with("Result has 12 rows and columns: project_name, budget"));
        assert!(summary.contains("budget: count=12, mean=55.00, min=0, max=110"));
        assert!(summary.contains("p9"));
        assert!(!summary.contains("p10"));
    }
}
