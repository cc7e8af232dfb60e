//! Text and JSON views of a finished request.

use inventorydb_core::{PipelineError, ResultSet, SchemaDescriptor};
use inventorydb_pipeline::{AgentState, PipelineState, ResultMetadata};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct AnswerView<'a> {
    pub request_id: String,
    pub generated_at: String,
    pub user_input: &'a str,
    pub improved_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<&'a str>,
    pub columns: Vec<&'a str>,
    pub rows: Vec<Value>,
    pub metadata: Option<&'a ResultMetadata>,
    pub insights: Option<&'a str>,
    pub error: Option<ErrorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    pub message: String,
    pub transient: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentView<'a> {
    pub final_answer: Option<&'a str>,
    pub iterations: u32,
    pub forced_stop: bool,
}

impl<'a> AnswerView<'a> {
    pub fn from_state(state: &'a PipelineState, show_sql: bool) -> Self {
        let results = state.query_results();
        Self {
            request_id: state.request_id().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            user_input: state.user_input(),
            improved_prompt: state.improved_prompt(),
            sql_query: state.sql_query().filter(|_| show_sql),
            columns: results.map(ResultSet::column_names).unwrap_or_default(),
            rows: results
                .map(|rows| rows.rows_as_json(rows.len()))
                .unwrap_or_default(),
            metadata: state.metadata(),
            insights: state.insights(),
            error: state.error().map(error_view),
            agent: None,
        }
    }

    pub fn from_agent(state: &'a AgentState, show_sql: bool) -> Self {
        let mut view = Self::from_state(state.pipeline(), show_sql);
        view.agent = Some(AgentView {
            final_answer: state.final_answer(),
            iterations: state.iteration_count(),
            forced_stop: state.forced_stop(),
        });
        view
    }
}

fn error_view(error: &PipelineError) -> ErrorView {
    ErrorView {
        kind: error.kind(),
        message: error.to_string(),
        transient: error.is_transient(),
    }
}

/// Human-readable answer for a linear pipeline run.
pub fn render_state(state: &PipelineState, show_sql: bool) -> String {
    let mut out = String::new();

    if let Some(prompt) = state.improved_prompt() {
        out.push_str(&format!("Interpreted as: {prompt}\n"));
    }
    if show_sql {
        if let Some(sql) = state.sql_query() {
            out.push_str(&format!("\nSQL:\n  {}\n", sql.replace('\n', "\n  ")));
        }
    }

    if let Some(error) = state.error() {
        out.push_str(&format!("\nError: {error}\n"));
        if error.is_transient() {
            out.push_str("This may be temporary; try the request again.\n");
        }
        return out;
    }

    if let (Some(rows), Some(metadata)) = (state.query_results(), state.metadata()) {
        out.push('\n');
        if !rows.is_empty() {
            out.push_str(&rows.format_table(rows.len()));
            out.push('\n');
        }
        if let Some(message) = &metadata.result_message {
            out.push_str(&format!("{message}\n"));
        }
        out.push_str(&format!(
            "({} of {} rows, {:.3}s)\n",
            metadata.displayed_rows, metadata.total_rows, metadata.execution_time
        ));
    }

    if let Some(insights) = state.insights() {
        out.push_str(&format!("\nInsights:\n{insights}\n"));
    }
    out
}

/// Agent answer first, then whatever table the loop produced.
pub fn render_agent(state: &AgentState, show_sql: bool) -> String {
    let mut out = String::new();
    if let Some(answer) = state.final_answer() {
        out.push_str(answer);
        out.push_str("\n\n");
    }
    out.push_str(&render_state(state.pipeline(), show_sql));
    if state.forced_stop() {
        out.push_str(&format!(
            "\nStopped after {} iterations before the agent finished.\n",
            state.iteration_count()
        ));
    }
    out
}

pub fn render_schema(schema: &SchemaDescriptor) -> String {
    let mut out = String::new();
    for (name, table) in &schema.tables {
        out.push_str(name);
        out.push('\n');
        for (column, ty) in &table.columns {
            let marker = if table.primary_key.as_deref() == Some(column.as_str()) {
                "  [pk]"
            } else {
                ""
            };
            out.push_str(&format!("  {column} {ty}{marker}\n"));
        }
        for (column, target) in &table.foreign_keys {
            out.push_str(&format!("  {column} -> {target}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventorydb_core::{CellValue, ColumnHeader, ExecutionFailure, fallback_schema};
    use inventorydb_pipeline::{StageDelta, shape};

    fn finished(rows: usize, cap: usize) -> PipelineState {
        let result = ResultSet::new(
            vec![ColumnHeader::new("client_name", "TEXT")],
            (0..rows)
                .map(|i| vec![CellValue::Text(format!("client {i}"))])
                .collect(),
        );
        let mut state = PipelineState::new("list clients", cap);
        state.apply(StageDelta::refined("List every client name."));
        state.apply(StageDelta::accepted_sql("SELECT client_name FROM clients"));
        state.apply(StageDelta::executed(result.clone(), 0.01));
        let (display, metadata) = shape(&result, rows, cap, 0.01);
        state.apply(StageDelta::shaped(display, metadata));
        state
    }

    #[test]
    fn sql_is_hidden_unless_requested() {
        let state = finished(2, 500);
        assert!(!render_state(&state, false).contains("SELECT"));
        assert!(render_state(&state, true).contains("SQL:\n  SELECT client_name FROM clients"));
    }

    #[test]
    fn truncated_answers_say_so() {
        let text = render_state(&finished(5, 2), false);
        assert!(text.contains("Showing 2 of 5 rows."));
        assert!(text.contains("(2 of 5 rows, 0.010s)"));
        assert!(!text.contains("client 4"));
    }

    #[test]
    fn errors_replace_the_table() {
        let mut state = PipelineState::new("list clients", 500);
        state.apply(StageDelta::execution_failed(PipelineError::Execution(
            ExecutionFailure::Timeout { seconds: 20 },
        )));
        let text = render_state(&state, false);
        assert!(text.contains("Error: Query execution failed: Query exceeded time limit (20s)."));
        assert!(text.contains("try the request again"));

        let view = AnswerView::from_state(&state, false);
        let json = serde_json::to_value(&view).expect("serializable");
        assert_eq!(json["error"]["kind"], "execution_timeout");
        assert_eq!(json["error"]["transient"], true);
        assert!(json.get("sql_query").is_none());
    }

    #[test]
    fn json_view_carries_all_displayed_rows() {
        let state = finished(3, 500);
        let json = serde_json::to_value(AnswerView::from_state(&state, true)).expect("serializable");
        assert_eq!(json["rows"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["columns"][0], "client_name");
        assert_eq!(json["sql_query"], "SELECT client_name FROM clients");
        assert_eq!(json["metadata"]["total_rows"], 3);
    }

    #[test]
    fn schema_listing_marks_keys() {
        let text = render_schema(&fallback_schema());
        assert!(text.contains("projects\n"));
        assert!(text.contains("  project_id INTEGER  [pk]\n"));
        assert!(text.contains("  client_id -> clients.client_id\n"));
    }
}
