//! Fixed toolset for the agent loop.
//!
//! The model only ever supplies a tool name and JSON arguments. Names are
//! matched against [`ToolName`]; arguments are checked against the schema
//! advertised for that tool before any handler runs.

use inventorydb_core::{PipelineError, SchemaDescriptor};
use inventorydb_llm::{ChatMessage, ToolCall, ToolSpec};
use inventorydb_sql::check_candidate;
use jsonschema::JSONSchema;
use schemars::JsonSchema;
use schemars::schema_for;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::services::Services;
use crate::state::{PipelineState, StageDelta};

/// Rows echoed back to the model after a successful query.
const SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetDatabaseSchema,
    ExecuteSqlQuery,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::GetDatabaseSchema, ToolName::ExecuteSqlQuery];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::GetDatabaseSchema => "get_database_schema",
            ToolName::ExecuteSqlQuery => "execute_sql_query",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolName::GetDatabaseSchema => {
                "Retrieve the database schema: tables, columns, data types, primary and foreign keys. Call this before writing SQL; the result is cached."
            }
            ToolName::ExecuteSqlQuery => {
                "Execute one read-only PostgreSQL SELECT statement and return a summary (row count, columns, sample rows). Queries time out after the configured limit."
            }
        }
    }

    fn parameters(self) -> Value {
        let schema = match self {
            ToolName::GetDatabaseSchema => schema_for!(SchemaArgs),
            ToolName::ExecuteSqlQuery => schema_for!(ExecuteArgs),
        };
        let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({"type": "object"}));
        if let Some(object) = value.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        value
    }
}

/// Arguments of `get_database_schema`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SchemaArgs {}

/// Arguments of `execute_sql_query`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteArgs {
    /// A single PostgreSQL SELECT statement.
    pub sql_query: String,
}

/// Tool specifications advertised to the model on every agent turn.
pub fn specs() -> Vec<ToolSpec> {
    ToolName::ALL
        .into_iter()
        .map(|tool| ToolSpec {
            name: tool.as_str().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        })
        .collect()
}

/// Result of one tool call: the reply turn plus the state update.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub message: ChatMessage,
    pub delta: StageDelta,
}

impl ToolOutcome {
    fn reply(call: &ToolCall, content: Value, delta: StageDelta) -> Self {
        Self {
            message: ChatMessage::tool(call.id.clone(), content.to_string()),
            delta,
        }
    }

    fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self::reply(call, json!({ "error": message.into() }), StageDelta::none())
    }
}

/// Route one call through the dispatch table. Reads `snapshot` only.
pub async fn dispatch(call: &ToolCall, snapshot: &PipelineState, services: &Services) -> ToolOutcome {
    let Some(tool) = ToolName::parse(&call.name) else {
        tracing::warn!(event = "unknown_tool", tool = %call.name);
        let available: Vec<&str> = ToolName::ALL.iter().map(|tool| tool.as_str()).collect();
        return ToolOutcome::error(
            call,
            format!("Unknown tool '{}'. Available tools: {}", call.name, available.join(", ")),
        );
    };

    let arguments = match parse_arguments(tool, &call.arguments) {
        Ok(arguments) => arguments,
        Err(message) => {
            tracing::warn!(event = "tool_arguments_rejected", tool = tool.as_str(), reason = %message);
            return ToolOutcome::error(call, message);
        }
    };

    tracing::info!(event = "tool_called", tool = tool.as_str());
    match tool {
        ToolName::GetDatabaseSchema => get_database_schema(call, snapshot, services).await,
        ToolName::ExecuteSqlQuery => match serde_json::from_value::<ExecuteArgs>(arguments) {
            Ok(args) => execute_sql_query(call, &args.sql_query, snapshot, services).await,
            Err(err) => ToolOutcome::error(call, format!("Invalid arguments: {err}")),
        },
    }
}

/// Parse the raw argument text and check it against the tool's schema.
fn parse_arguments(tool: ToolName, raw: &str) -> Result<Value, String> {
    let value: Value = if raw.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(raw).map_err(|err| format!("Arguments are not valid JSON: {err}"))?
    };

    let schema = tool.parameters();
    let compiled = JSONSchema::compile(&schema).map_err(|err| format!("Tool schema error: {err}"))?;
    if let Err(errors) = compiled.validate(&value) {
        let reasons: Vec<String> = errors.map(|err| err.to_string()).collect();
        return Err(format!("Invalid arguments: {}", reasons.join("; ")));
    }
    Ok(value)
}

async fn schema_for_call(
    snapshot: &PipelineState,
    services: &Services,
) -> Result<(SchemaDescriptor, bool), String> {
    if let Some(schema) = snapshot.schema() {
        return Ok((schema.clone(), true));
    }
    services
        .schema
        .fetch()
        .await
        .map(|schema| (schema, false))
        .map_err(|err| {
            tracing::error!(event = "schema_failed", error = %err);
            format!("Failed to retrieve schema: {}", err.user_message())
        })
}

async fn get_database_schema(call: &ToolCall, snapshot: &PipelineState, services: &Services) -> ToolOutcome {
    match schema_for_call(snapshot, services).await {
        Ok((schema, cached)) => {
            let content = serde_json::to_value(&schema).unwrap_or_else(|_| json!({"tables": {}}));
            let delta = if cached {
                StageDelta::none()
            } else {
                StageDelta::schema(schema)
            };
            ToolOutcome::reply(call, content, delta)
        }
        Err(message) => ToolOutcome::error(call, message),
    }
}

async fn execute_sql_query(
    call: &ToolCall,
    sql: &str,
    snapshot: &PipelineState,
    services: &Services,
) -> ToolOutcome {
    let (schema, cached) = match schema_for_call(snapshot, services).await {
        Ok(found) => found,
        Err(message) => return ToolOutcome::error(call, message),
    };
    let schema_delta = if cached {
        StageDelta::none()
    } else {
        StageDelta::schema(schema.clone())
    };

    if let Err(err) = check_candidate(sql, &schema) {
        let message = match err {
            PipelineError::Synthesis(text) | PipelineError::Validation(text) => text,
            other => other.to_string(),
        };
        return ToolOutcome::reply(
            call,
            json!({ "error": message }),
            schema_delta.merge(StageDelta::results_discarded()),
        );
    }

    match services.executor.execute(sql, services.query_timeout).await {
        Ok(outcome) => {
            let seconds = outcome.elapsed_secs();
            let content = json!({
                "row_count": outcome.rows.len(),
                "columns": outcome.rows.column_names(),
                "sample_rows": outcome.rows.rows_as_json(SAMPLE_ROWS),
                "execution_time_seconds": seconds,
                "note": "The full result is shown to the user as a table. Do not repeat the rows.",
            });
            let delta = schema_delta
                .merge(StageDelta::accepted_sql(sql))
                .merge(StageDelta::executed(outcome.rows, seconds));
            ToolOutcome::reply(call, content, delta)
        }
        Err(failure) => {
            let message = PipelineError::Execution(failure).to_string();
            tracing::warn!(event = "tool_query_failed", error = %message);
            ToolOutcome::reply(
                call,
                json!({ "error": message }),
                schema_delta.merge(StageDelta::results_discarded()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_cover_the_fixed_toolset() {
        let specs = specs();
        let names: Vec<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, vec!["get_database_schema", "execute_sql_query"]);

        let execute = &specs[1].parameters;
        assert_eq!(execute["type"], "object");
        assert_eq!(execute["required"][0], "sql_query");
        assert!(execute.get("$schema").is_none());
    }

    #[test]
    fn arguments_are_schema_checked() {
        assert!(parse_arguments(ToolName::ExecuteSqlQuery, r#"{"sql_query": "SELECT 1"}"#).is_ok());
        assert!(parse_arguments(ToolName::GetDatabaseSchema, "").is_ok());

        let missing = parse_arguments(ToolName::ExecuteSqlQuery, "{}").expect_err("missing field");
        assert!(missing.starts_with("Invalid arguments:"));

        let wrong_type =
            parse_arguments(ToolName::ExecuteSqlQuery, r#"{"sql_query": 42}"#).expect_err("wrong type");
        assert!(wrong_type.starts_with("Invalid arguments:"));

        let garbage = parse_arguments(ToolName::ExecuteSqlQuery, "{not json").expect_err("bad json");
        assert!(garbage.starts_with("Arguments are not valid JSON"));
    }

    #[test]
    fn unknown_names_do_not_parse() {
        assert_eq!(ToolName::parse("execute_sql_query"), Some(ToolName::ExecuteSqlQuery));
        assert_eq!(ToolName::parse("drop_database"), None);
    }
}
