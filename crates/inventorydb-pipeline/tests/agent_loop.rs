mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use inventorydb_core::{ColumnHeader, ExecutionFailure, PipelineError, ResultSet};
use inventorydb_llm::{AssistantTurn, Gateway, ModelSettings, Role};
use inventorydb_pipeline::{
    AgentLoop, EMPTY_RESULT_FALLBACK, ITERATION_LIMIT_NOTICE, MAX_ITERATIONS, Services,
};
use serde_json::Value;

use support::{
    GarbledModel, ScriptedExecutor, ScriptedModel, StaticSchema, harness, project_rows, tool_turn,
};

fn tool_payloads(messages: &[inventorydb_llm::ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| message.role == Role::Tool)
        .map(|message| serde_json::from_str(&message.content).expect("tool replies are JSON"))
        .collect()
}

#[tokio::test]
async fn schema_then_query_then_answer() -> anyhow::Result<()> {
    let model = ScriptedModel::new("", "", "Budgets climb steadily from the first project to the third.")
        .with_turns(vec![
            tool_turn("call_1", "get_database_schema", "{}"),
            tool_turn("call_2", "execute_sql_query", r#"{"sql_query": "SELECT * FROM projects"}"#),
            AssistantTurn::text("There are 3 projects."),
        ]);
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(project_rows(3)));

    let state = AgentLoop::new(h.services.clone()).run("how many projects are there?", 500).await;

    assert_eq!(state.iteration_count(), 3);
    assert!(!state.forced_stop());
    assert_eq!(state.final_answer(), Some("There are 3 projects."));
    assert_eq!(state.messages().len(), 7);
    assert_eq!(state.messages()[0].role, Role::System);
    assert_eq!(state.messages()[1].role, Role::User);

    let payloads = tool_payloads(state.messages());
    assert!(payloads[0]["tables"]["projects"].is_object());
    assert_eq!(payloads[1]["row_count"], 3);
    assert_eq!(payloads[1]["columns"][2], "budget");

    let pipeline = state.pipeline();
    assert!(pipeline.error().is_none());
    assert_eq!(pipeline.sql_query(), Some("SELECT * FROM projects"));
    assert!(pipeline.sql_valid());
    let metadata = pipeline.metadata().ok_or_else(|| anyhow::anyhow!("no metadata"))?;
    assert_eq!(metadata.displayed_rows, 3);
    assert_eq!(
        pipeline.insights(),
        Some("Budgets climb steadily from the first project to the third.")
    );
    assert_eq!(h.schema.fetches.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn schema_is_fetched_once_per_request() {
    let model = ScriptedModel::new("", "", "").with_turns(vec![
        tool_turn("call_1", "get_database_schema", ""),
        tool_turn("call_2", "get_database_schema", "{}"),
        tool_turn("call_3", "execute_sql_query", r#"{"sql_query": "SELECT client_name FROM clients"}"#),
        AssistantTurn::text("Listed the clients."),
    ]);
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(project_rows(1)));

    let state = AgentLoop::new(h.services.clone()).run("list clients", 500).await;

    assert_eq!(state.iteration_count(), 4);
    assert_eq!(h.schema.fetches.load(Ordering::SeqCst), 1);
    let payloads = tool_payloads(state.messages());
    assert_eq!(payloads[0], payloads[1]);
}

#[tokio::test]
async fn loop_stops_after_five_agent_turns() {
    let model = ScriptedModel::new("", "", "").repeating(tool_turn("call", "get_database_schema", "{}"));
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(project_rows(1)));

    let state = AgentLoop::new(h.services.clone()).run("keep going forever", 500).await;

    assert_eq!(state.iteration_count(), MAX_ITERATIONS);
    assert_eq!(h.model.chats.load(Ordering::SeqCst), 5);
    assert!(state.forced_stop());
    assert!(state.pipeline().error().is_none());

    let last = state.messages().last().expect("notice appended");
    assert_eq!(last.role, Role::System);
    assert_eq!(last.content, ITERATION_LIMIT_NOTICE);
    assert_eq!(tool_payloads(state.messages()).len(), 4);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let model = ScriptedModel::new("", "", "").with_turns(vec![
        tool_turn("call_1", "drop_database", "{}"),
        AssistantTurn::text("I can only read data."),
    ]);
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(project_rows(1)));

    let state = AgentLoop::new(h.services.clone()).run("drop the database", 500).await;

    let payloads = tool_payloads(state.messages());
    assert_eq!(
        payloads[0]["error"],
        "Unknown tool 'drop_database'. Available tools: get_database_schema, execute_sql_query"
    );
    assert!(state.pipeline().error().is_none());
    assert!(h.executor.statements().is_empty());
    assert_eq!(state.final_answer(), Some("I can only read data."));
}

#[tokio::test]
async fn unsafe_sql_never_reaches_the_executor() {
    let model = ScriptedModel::new("", "", "").with_turns(vec![
        tool_turn("call_1", "execute_sql_query", r#"{"sql_query": "DELETE FROM projects"}"#),
        tool_turn("call_2", "execute_sql_query", r#"{"sql_query": 7}"#),
        AssistantTurn::text("That request modifies data, which is not allowed."),
    ]);
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(project_rows(1)));

    let state = AgentLoop::new(h.services.clone()).run("delete all projects", 500).await;

    let payloads = tool_payloads(state.messages());
    assert_eq!(
        payloads[0]["error"],
        "Query contains forbidden keyword 'DELETE'. Only SELECT queries are allowed."
    );
    let invalid = payloads[1]["error"].as_str().unwrap_or_default();
    assert!(invalid.starts_with("Invalid arguments:"));

    assert!(h.executor.statements().is_empty());
    assert!(state.pipeline().error().is_none());
    assert!(state.pipeline().sql_query().is_none());
    assert!(state.pipeline().metadata().is_none());
}

#[tokio::test]
async fn empty_agent_result_still_gets_an_explanation() {
    let empty = ResultSet::new(vec![ColumnHeader::new("order_id", "INT4")], Vec::new());
    let model = ScriptedModel::new("", "", "ERROR: rate limited").with_turns(vec![
        tool_turn(
            "call_1",
            "execute_sql_query",
            r#"{"sql_query": "SELECT order_id FROM orders WHERE amount > 1000000"}"#,
        ),
        AssistantTurn::text("No orders exceed one million."),
    ]);
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(empty));

    let state = AgentLoop::new(h.services.clone()).run("huge orders", 500).await;

    assert_eq!(state.pipeline().total_rows(), 0);
    assert_eq!(state.pipeline().insights(), Some(EMPTY_RESULT_FALLBACK));
}

#[tokio::test]
async fn gateway_failure_is_fatal() {
    let services = Services::new(
        Arc::new(StaticSchema::fallback()),
        Gateway::unconfigured(ModelSettings::default()),
        Arc::new(ScriptedExecutor::returning(project_rows(1))),
    );

    let state = AgentLoop::new(services).run("anything", 500).await;

    assert_eq!(state.iteration_count(), 0);
    assert_eq!(
        state.pipeline().error(),
        Some(&PipelineError::Agent(
            "OpenAI client not configured. Check OPENAI_API_KEY.".to_string()
        ))
    );
    assert_eq!(state.messages().len(), 2);
}

#[tokio::test]
async fn failed_follow_up_query_drops_earlier_rows() {
    let model = ScriptedModel::new("", "", "").with_turns(vec![
        tool_turn("call_1", "execute_sql_query", r#"{"sql_query": "SELECT * FROM projects"}"#),
        tool_turn(
            "call_2",
            "execute_sql_query",
            r#"{"sql_query": "SELECT * FROM orders ORDER BY amount DESC"}"#,
        ),
        AssistantTurn::text("The second query timed out."),
    ]);
    let executor = ScriptedExecutor::failing(ExecutionFailure::Timeout { seconds: 20 })
        .first(Ok(project_rows(3)));
    let h = harness(model, StaticSchema::fallback(), executor);

    let state = AgentLoop::new(h.services.clone()).run("projects, then orders", 500).await;

    assert_eq!(h.executor.statements().len(), 2);
    let payloads = tool_payloads(state.messages());
    assert_eq!(payloads[0]["row_count"], 3);
    assert_eq!(
        payloads[1]["error"],
        "Query execution failed: Query exceeded time limit (20s). Please add filters or narrow your query."
    );

    let pipeline = state.pipeline();
    assert!(pipeline.error().is_none());
    assert_eq!(pipeline.total_rows(), 0);
    assert_eq!(pipeline.execution_time(), 0.0);
    assert!(pipeline.query_results().is_none());
    assert!(pipeline.sql_query().is_none());
    assert!(!pipeline.sql_valid());
    assert!(pipeline.metadata().is_none());
    assert!(pipeline.insights().is_none());
}

#[tokio::test]
async fn rejected_follow_up_query_drops_earlier_rows() {
    let model = ScriptedModel::new("", "", "").with_turns(vec![
        tool_turn("call_1", "execute_sql_query", r#"{"sql_query": "SELECT * FROM projects"}"#),
        tool_turn("call_2", "execute_sql_query", r#"{"sql_query": "DROP TABLE projects"}"#),
        AssistantTurn::text("Dropping tables is not allowed."),
    ]);
    let h = harness(model, StaticSchema::fallback(), ScriptedExecutor::returning(project_rows(3)));

    let state = AgentLoop::new(h.services.clone()).run("show then drop projects", 500).await;

    assert_eq!(h.executor.statements(), vec!["SELECT * FROM projects".to_string()]);
    assert!(state.pipeline().query_results().is_none());
    assert_eq!(state.pipeline().total_rows(), 0);
    assert!(state.pipeline().sql_query().is_none());
}

#[tokio::test]
async fn unreadable_model_reply_is_reported_plainly() {
    let services = Services::new(
        Arc::new(StaticSchema::fallback()),
        Gateway::new(Arc::new(GarbledModel), ModelSettings::default()),
        Arc::new(ScriptedExecutor::returning(project_rows(1))),
    );

    let state = AgentLoop::new(services).run("anything", 500).await;

    assert_eq!(
        state.pipeline().error(),
        Some(&PipelineError::Agent(
            "The language model returned an unreadable response.".to_string()
        ))
    );
    let shown = state.pipeline().error().map(ToString::to_string).unwrap_or_default();
    assert!(!shown.contains("json"));
}
