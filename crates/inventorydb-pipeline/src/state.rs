use inventorydb_core::{PipelineError, ResultSet, SchemaDescriptor};
use serde::Serialize;
use uuid::Uuid;

/// Display facts produced once by the result shaper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetadata {
    pub total_rows: usize,
    pub displayed_rows: usize,
    pub execution_time: f64,
    pub capped: bool,
    pub result_message: Option<String>,
}

/// Per-request record threaded through every stage.
///
/// Fields are read through accessors and written only by [`PipelineState::apply`].
/// `user_input` and `display_cap` are fixed at construction.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    request_id: Uuid,
    user_input: String,
    display_cap: usize,
    schema: Option<SchemaDescriptor>,
    improved_prompt: Option<String>,
    sql_query: Option<String>,
    sql_valid: bool,
    query_results: Option<ResultSet>,
    total_rows: usize,
    execution_time: f64,
    metadata: Option<ResultMetadata>,
    insights: Option<String>,
    error: Option<PipelineError>,
    edit_count: u32,
}

impl PipelineState {
    pub fn new(user_input: impl Into<String>, display_cap: usize) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_input: user_input.into(),
            display_cap,
            schema: None,
            improved_prompt: None,
            sql_query: None,
            sql_valid: false,
            query_results: None,
            total_rows: 0,
            execution_time: 0.0,
            metadata: None,
            insights: None,
            error: None,
            edit_count: 0,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn display_cap(&self) -> usize {
        self.display_cap
    }

    pub fn schema(&self) -> Option<&SchemaDescriptor> {
        self.schema.as_ref()
    }

    pub fn improved_prompt(&self) -> Option<&str> {
        self.improved_prompt.as_deref()
    }

    pub fn sql_query(&self) -> Option<&str> {
        self.sql_query.as_deref()
    }

    pub fn sql_valid(&self) -> bool {
        self.sql_valid
    }

    pub fn query_results(&self) -> Option<&ResultSet> {
        self.query_results.as_ref()
    }

    /// Full result count, unaffected by the display cap.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn execution_time(&self) -> f64 {
        self.execution_time
    }

    pub fn metadata(&self) -> Option<&ResultMetadata> {
        self.metadata.as_ref()
    }

    pub fn insights(&self) -> Option<&str> {
        self.insights.as_deref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn edit_count(&self) -> u32 {
        self.edit_count
    }

    /// Merge a stage's output.
    ///
    /// Once an error is recorded the state is frozen: later deltas, including
    /// ones carrying another error, are dropped.
    pub fn apply(&mut self, delta: StageDelta) {
        if let Some(existing) = &self.error {
            tracing::debug!(event = "delta_ignored", existing_error = existing.kind());
            return;
        }

        let StageDelta {
            schema,
            improved_prompt,
            sql_query,
            sql_valid,
            execution,
            display,
            insights,
            edit_count,
            error,
            discard_query,
        } = delta;

        if discard_query {
            self.sql_query = None;
            self.sql_valid = false;
            self.metadata = None;
        }

        if let Some(schema) = schema {
            self.schema = Some(schema);
        }
        if let Some(prompt) = improved_prompt {
            self.improved_prompt = Some(prompt);
        }
        if let Some(sql) = sql_query {
            self.sql_query = Some(sql);
        }
        if let Some(valid) = sql_valid {
            self.sql_valid = valid;
        }
        if let Some(execution) = execution {
            self.query_results = execution.rows;
            self.total_rows = execution.total_rows;
            self.execution_time = execution.execution_time;
        }
        if let Some((rows, metadata)) = display {
            self.query_results = Some(rows);
            self.metadata = Some(metadata);
        }
        if let Some(text) = insights {
            self.insights = Some(text);
        }
        if let Some(count) = edit_count {
            self.edit_count = count;
        }
        if let Some(error) = error {
            if matches!(error, PipelineError::Synthesis(_) | PipelineError::Validation(_)) {
                self.sql_valid = false;
            }
            self.error = Some(error);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ExecutionDelta {
    rows: Option<ResultSet>,
    total_rows: usize,
    execution_time: f64,
}

/// Partial update returned by a stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageDelta {
    schema: Option<SchemaDescriptor>,
    improved_prompt: Option<String>,
    sql_query: Option<String>,
    sql_valid: Option<bool>,
    execution: Option<ExecutionDelta>,
    display: Option<(ResultSet, ResultMetadata)>,
    insights: Option<String>,
    edit_count: Option<u32>,
    error: Option<PipelineError>,
    discard_query: bool,
}

impl StageDelta {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn failed(error: PipelineError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn schema(schema: SchemaDescriptor) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    pub fn refined(prompt: impl Into<String>) -> Self {
        Self {
            improved_prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    pub fn accepted_sql(sql: impl Into<String>) -> Self {
        Self {
            sql_query: Some(sql.into()),
            sql_valid: Some(true),
            ..Self::default()
        }
    }

    /// Invalid candidate; the text, when there is one, is kept for diagnostics.
    pub fn rejected_sql(sql: Option<String>, error: PipelineError) -> Self {
        Self {
            sql_query: sql,
            sql_valid: Some(false),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn executed(rows: ResultSet, execution_time: f64) -> Self {
        let total_rows = rows.len();
        Self {
            execution: Some(ExecutionDelta {
                rows: Some(rows),
                total_rows,
                execution_time,
            }),
            ..Self::default()
        }
    }

    /// Failed execution zeroes the row count and timing.
    pub fn execution_failed(error: PipelineError) -> Self {
        Self {
            execution: Some(ExecutionDelta {
                rows: None,
                total_rows: 0,
                execution_time: 0.0,
            }),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Recoverable failure: the previous query and its rows are dropped and
    /// the counters zeroed, but no error is recorded.
    pub fn results_discarded() -> Self {
        Self {
            execution: Some(ExecutionDelta {
                rows: None,
                total_rows: 0,
                execution_time: 0.0,
            }),
            discard_query: true,
            ..Self::default()
        }
    }

    pub fn shaped(display: ResultSet, metadata: ResultMetadata) -> Self {
        Self {
            display: Some((display, metadata)),
            ..Self::default()
        }
    }

    pub fn insights(text: Option<String>) -> Self {
        Self {
            insights: text,
            ..Self::default()
        }
    }

    pub fn edited(count: u32) -> Self {
        Self {
            edit_count: Some(count),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: PipelineError) -> Self {
        self.error = Some(error);
        self
    }

    /// Merge two deltas; fields set in `other` win, the first error wins.
    pub fn merge(mut self, other: StageDelta) -> Self {
        self.schema = other.schema.or(self.schema);
        self.improved_prompt = other.improved_prompt.or(self.improved_prompt);
        self.sql_query = other.sql_query.or(self.sql_query);
        self.sql_valid = other.sql_valid.or(self.sql_valid);
        self.execution = other.execution.or(self.execution);
        self.display = other.display.or(self.display);
        self.insights = other.insights.or(self.insights);
        self.edit_count = other.edit_count.or(self.edit_count);
        self.error = self.error.or(other.error);
        self.discard_query = self.discard_query || other.discard_query;
        self
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }
}
