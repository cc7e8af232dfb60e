#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use inventorydb_core::{
    CellValue, ColumnHeader, ExecutionFailure, ResultSet, SchemaDescriptor, fallback_schema,
};
use inventorydb_introspect::{IntrospectError, SchemaSource};
use inventorydb_llm::{
    AssistantTurn, ChatMessage, Gateway, GatewayError, LanguageModel, ModelSettings, ToolCall,
    ToolSpec,
};
use inventorydb_pipeline::prompts::{INSIGHTS_SYSTEM, REFINER_SYSTEM};
use inventorydb_pipeline::{ConfirmationReviewer, Review, Services};
use inventorydb_sql::synthesizer::SYNTHESIZER_SYSTEM;
use inventorydb_sql::{QueryExecutor, QueryOutcome};

/// Which prompt a completion answered, plus the user content it saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub kind: &'static str,
    pub user: String,
}

/// Model that answers each system prompt with a fixed reply and plays back
/// a queue of agent turns.
#[derive(Default)]
pub struct ScriptedModel {
    pub refine: String,
    pub sql: String,
    pub insight: String,
    turns: Mutex<VecDeque<AssistantTurn>>,
    repeat: Option<AssistantTurn>,
    pub completions: Mutex<Vec<Completion>>,
    pub chats: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(refine: &str, sql: &str, insight: &str) -> Self {
        Self {
            refine: refine.to_string(),
            sql: sql.to_string(),
            insight: insight.to_string(),
            ..Self::default()
        }
    }

    pub fn with_turns(mut self, turns: Vec<AssistantTurn>) -> Self {
        self.turns = Mutex::new(turns.into());
        self
    }

    /// Turn returned whenever the queue is exhausted.
    pub fn repeating(mut self, turn: AssistantTurn) -> Self {
        self.repeat = Some(turn);
        self
    }

    pub fn completions_of(&self, kind: &str) -> Vec<Completion> {
        self.completions
            .lock()
            .expect("lock")
            .iter()
            .filter(|completion| completion.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        _settings: &ModelSettings,
    ) -> inventorydb_llm::Result<String> {
        let (kind, reply) = if system == REFINER_SYSTEM {
            ("refine", self.refine.clone())
        } else if system == SYNTHESIZER_SYSTEM {
            ("sql", self.sql.clone())
        } else if system == INSIGHTS_SYSTEM {
            ("insight", self.insight.clone())
        } else {
            ("unknown", "ERROR: unexpected prompt".to_string())
        };
        self.completions.lock().expect("lock").push(Completion {
            kind,
            user: user.to_string(),
        });
        Ok(reply)
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
        _settings: &ModelSettings,
    ) -> inventorydb_llm::Result<AssistantTurn> {
        self.chats.fetch_add(1, Ordering::SeqCst);
        let next = self.turns.lock().expect("lock").pop_front();
        Ok(next
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| AssistantTurn::text("Done.")))
    }
}

/// Model whose every call fails with an unparseable response body.
pub struct GarbledModel;

fn garbled() -> GatewayError {
    match serde_json::from_str::<serde_json::Value>("<html>bad gateway</html>") {
        Ok(_) => GatewayError::EmptyResponse,
        Err(err) => GatewayError::Json(err),
    }
}

#[async_trait]
impl LanguageModel for GarbledModel {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _settings: &ModelSettings,
    ) -> inventorydb_llm::Result<String> {
        Err(garbled())
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
        _settings: &ModelSettings,
    ) -> inventorydb_llm::Result<AssistantTurn> {
        Err(garbled())
    }
}

pub fn tool_turn(id: &str, name: &str, arguments: &str) -> AssistantTurn {
    AssistantTurn {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
    }
}

/// Schema source with a fetch counter.
pub struct StaticSchema {
    schema: Option<SchemaDescriptor>,
    pub fetches: AtomicUsize,
}

impl StaticSchema {
    pub fn fallback() -> Self {
        Self {
            schema: Some(fallback_schema()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            schema: None,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SchemaSource for StaticSchema {
    fn engine(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> inventorydb_introspect::Result<SchemaDescriptor> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.schema
            .clone()
            .ok_or_else(|| IntrospectError::InvalidConnection("bad url".to_string()))
    }
}

/// Executor returning canned results and recording every statement.
/// Queued outcomes are used first, then `response` for every later call.
pub struct ScriptedExecutor {
    response: Result<ResultSet, ExecutionFailure>,
    queued: Mutex<VecDeque<Result<ResultSet, ExecutionFailure>>>,
    pub executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn returning(rows: ResultSet) -> Self {
        Self {
            response: Ok(rows),
            queued: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: ExecutionFailure) -> Self {
        Self {
            response: Err(failure),
            queued: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `first` once, then behave as configured.
    pub fn first(self, first: Result<ResultSet, ExecutionFailure>) -> Self {
        self.queued.lock().expect("lock").push_back(first);
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed.lock().expect("lock").clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, sql: &str, _timeout: Duration) -> Result<QueryOutcome, ExecutionFailure> {
        self.executed.lock().expect("lock").push(sql.to_string());
        let next = self.queued.lock().expect("lock").pop_front();
        next.unwrap_or_else(|| self.response.clone()).map(|rows| QueryOutcome {
            rows,
            elapsed: Duration::from_millis(12),
        })
    }
}

/// Reviewer that rejects until `accept_after` rejections have happened.
pub struct ScriptedReviewer {
    accept_after: Option<u32>,
    pub reviewed: Mutex<Vec<String>>,
}

impl ScriptedReviewer {
    pub fn always_reject() -> Self {
        Self {
            accept_after: None,
            reviewed: Mutex::new(Vec::new()),
        }
    }

    pub fn accept_after(rejections: u32) -> Self {
        Self {
            accept_after: Some(rejections),
            reviewed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConfirmationReviewer for ScriptedReviewer {
    async fn review(&self, improved_prompt: &str, edits_so_far: u32) -> Review {
        self.reviewed
            .lock()
            .expect("lock")
            .push(improved_prompt.to_string());
        match self.accept_after {
            Some(limit) if edits_so_far >= limit => Review::Accept,
            _ => Review::Reject {
                feedback: format!("be more specific ({edits_so_far})"),
            },
        }
    }
}

/// `project_id, project_name, budget` rows in ascending id order.
pub fn project_rows(n: usize) -> ResultSet {
    ResultSet::new(
        vec![
            ColumnHeader::new("project_id", "INT4"),
            ColumnHeader::new("project_name", "TEXT"),
            ColumnHeader::new("budget", "NUMERIC"),
        ],
        (0..n)
            .map(|i| {
                vec![
                    CellValue::Int(i as i64 + 1),
                    CellValue::Text(format!("Project {}", i + 1)),
                    CellValue::Float(1000.0 + i as f64),
                ]
            })
            .collect(),
    )
}

pub struct Harness {
    pub model: Arc<ScriptedModel>,
    pub schema: Arc<StaticSchema>,
    pub executor: Arc<ScriptedExecutor>,
    pub services: Services,
}

pub fn harness(model: ScriptedModel, schema: StaticSchema, executor: ScriptedExecutor) -> Harness {
    let model = Arc::new(model);
    let schema = Arc::new(schema);
    let executor = Arc::new(executor);
    let services = Services::new(
        schema.clone(),
        Gateway::new(model.clone(), ModelSettings::default()),
        executor.clone(),
    );
    Harness {
        model,
        schema,
        executor,
        services,
    }
}

pub const REFINED: &str = "List every project whose start_date falls in 2023.";
pub const SQL_2023: &str =
    "```sql\nSELECT * FROM projects WHERE start_date >= '2023-01-01' AND start_date < '2024-01-01'\n```";
pub const INSIGHT: &str = "Three projects started in 2023; budgets range from 1000 to 1002.";
