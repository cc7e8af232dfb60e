mod config;
mod logging;
mod render;
mod review;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use inventorydb_introspect::{IntrospectError, IntrospectOptions, SchemaProvider, SchemaSource};
use inventorydb_llm::{Gateway, GatewayError, ModelSettings, OpenAiClient, is_error_reply};
use inventorydb_pipeline::{AgentLoop, DEFAULT_MAX_EDITS, Pipeline, Services};
use inventorydb_sql::{
    ConnectionFactory, DisconnectedExecutor, PostgresExecutor, QueryExecutor, SqlError,
    check_candidate, safety,
};
use thiserror::Error;

use config::{Config, ConfigError};
use logging::init_logging;
use render::{AnswerView, render_agent, render_schema, render_state};
use review::TerminalReviewer;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("language model error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("schema error: {0}")]
    Introspect(#[from] IntrospectError),
    #[error("database error: {0}")]
    Sql(#[from] SqlError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request ended with a {kind} error")]
    RequestFailed { kind: &'static str },
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("{failed} connection check(s) failed")]
    CheckFailed { failed: usize },
}

#[derive(Parser, Debug)]
#[command(
    name = "inventorydb",
    version,
    about = "Ask questions about an inventory database in plain language"
)]
struct Cli {
    /// TOML config file (defaults to ./inventorydb.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a request through the fixed pipeline.
    Ask(AskArgs),
    /// Let the model drive schema lookups and queries itself.
    Agent(AgentArgs),
    /// Print the schema the model will see.
    Schema(SchemaArgs),
    /// Check the language model and database connections.
    Check,
    /// Run the local safety checks on a SQL statement without executing it.
    ValidateSql(ValidateSqlArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Ask(_) => "ask",
            Command::Agent(_) => "agent",
            Command::Schema(_) => "schema",
            Command::Check => "check",
            Command::ValidateSql(_) => "validate-sql",
        }
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Maximum rows to display (overrides INVENTORYDB_DISPLAY_CAP).
    #[arg(long, value_name = "ROWS")]
    display_cap: Option<usize>,
    /// Print the generated SQL.
    #[arg(long, default_value_t = false)]
    show_sql: bool,
    /// Emit a JSON document instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct AskArgs {
    /// Natural-language request.
    #[arg(required = true, value_name = "REQUEST")]
    request: Vec<String>,
    #[command(flatten)]
    output: OutputArgs,
    /// Review the interpreted request before any SQL is generated.
    #[arg(long, default_value_t = false)]
    confirm: bool,
    /// Rejections allowed before the request is abandoned.
    #[arg(long, default_value_t = DEFAULT_MAX_EDITS, requires = "confirm")]
    max_edits: u32,
}

#[derive(Args, Debug)]
struct AgentArgs {
    /// Natural-language request.
    #[arg(required = true, value_name = "REQUEST")]
    request: Vec<String>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Print the JSON descriptor sent to the model.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct ValidateSqlArgs {
    /// SQL statement to check.
    #[arg(required = true, value_name = "SQL")]
    sql: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let log_path = init_logging(&config.log_dir)?;
    tracing::info!(
        event = "cli_started",
        command = cli.command.name(),
        log = %log_path.display(),
        config = %config.describe()
    );

    let timer = Instant::now();
    let result = match cli.command {
        Command::Ask(args) => run_ask(&config, args).await,
        Command::Agent(args) => run_agent(&config, args).await,
        Command::Schema(args) => run_schema(&config, args).await,
        Command::Check => run_check(&config).await,
        Command::ValidateSql(args) => run_validate_sql(&config, args).await,
    };

    tracing::info!(
        event = "cli_finished",
        status = if result.is_ok() { "success" } else { "failure" },
        duration_ms = timer.elapsed().as_millis()
    );
    result
}

async fn run_ask(config: &Config, args: AskArgs) -> Result<(), CliError> {
    let request = join_request(&args.request)?;
    let display_cap = display_cap(config, &args.output)?;

    let mut pipeline = Pipeline::new(build_services(config)?);
    if args.confirm {
        pipeline = pipeline.with_confirmation(Arc::new(TerminalReviewer), args.max_edits);
    }

    let state = pipeline.run(&request, display_cap).await;
    if args.output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&AnswerView::from_state(&state, args.output.show_sql))?
        );
    } else {
        print!("{}", render_state(&state, args.output.show_sql));
    }

    match state.error() {
        Some(error) => Err(CliError::RequestFailed { kind: error.kind() }),
        None => Ok(()),
    }
}

async fn run_agent(config: &Config, args: AgentArgs) -> Result<(), CliError> {
    let request = join_request(&args.request)?;
    let display_cap = display_cap(config, &args.output)?;

    let state = AgentLoop::new(build_services(config)?)
        .run(&request, display_cap)
        .await;
    if args.output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&AnswerView::from_agent(&state, args.output.show_sql))?
        );
    } else {
        print!("{}", render_agent(&state, args.output.show_sql));
    }

    match state.pipeline().error() {
        Some(error) => Err(CliError::RequestFailed { kind: error.kind() }),
        None => Ok(()),
    }
}

async fn run_schema(config: &Config, args: SchemaArgs) -> Result<(), CliError> {
    let provider = schema_provider(config)?;
    let schema = provider.fetch().await?;
    tracing::info!(event = "schema_printed", engine = provider.engine(), tables = schema.tables.len());

    if args.json {
        println!("{}", schema.to_prompt_json());
    } else {
        if !provider.is_live() {
            println!("(no DATABASE_URL configured; showing the fallback schema)\n");
        }
        print!("{}", render_schema(&schema));
    }
    Ok(())
}

async fn run_check(config: &Config) -> Result<(), CliError> {
    let mut failed = 0;

    if config.openai_api_key.is_some() {
        let reply = build_gateway(config)?
            .complete("Reply with the single word OK.", "ping")
            .await;
        if is_error_reply(&reply) {
            failed += 1;
            println!("openai:   failed ({reply})");
        } else {
            println!("openai:   ok (model {})", config.model);
        }
    } else {
        failed += 1;
        println!("openai:   not configured (set OPENAI_API_KEY)");
    }

    match config.database_url.as_deref() {
        Some(url) => {
            let factory = ConnectionFactory::from_url(url)?;
            match factory.ping().await {
                Ok(()) => println!("database: ok ({})", factory.display()),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(event = "database_check_failed", error = %err);
                    println!("database: failed ({})", factory.display());
                }
            }
        }
        None => {
            failed += 1;
            println!("database: not configured (set DATABASE_URL); the fallback schema will be used");
        }
    }

    if failed > 0 {
        return Err(CliError::CheckFailed { failed });
    }
    Ok(())
}

async fn run_validate_sql(config: &Config, args: ValidateSqlArgs) -> Result<(), CliError> {
    let sql = args.sql.join(" ");
    safety::validate(&sql)
        .into_result()
        .map_err(CliError::Rejected)?;

    let schema = schema_provider(config)?.fetch().await?;
    check_candidate(&sql, &schema).map_err(|err| CliError::Rejected(err.to_string()))?;
    println!("ok: read-only single statement; every referenced table exists");
    Ok(())
}

fn join_request(words: &[String]) -> Result<String, CliError> {
    let request = words.join(" ").trim().to_string();
    if request.is_empty() {
        return Err(CliError::InvalidRequest("the request is empty".to_string()));
    }
    Ok(request)
}

fn display_cap(config: &Config, output: &OutputArgs) -> Result<usize, CliError> {
    match output.display_cap {
        Some(0) => Err(CliError::InvalidRequest(
            "--display-cap must be at least 1".to_string(),
        )),
        Some(cap) => Ok(cap),
        None => Ok(config.display_cap),
    }
}

fn build_gateway(config: &Config) -> Result<Gateway, CliError> {
    let settings = ModelSettings {
        model: config.model.clone(),
        temperature: config.temperature,
    };
    let Some(api_key) = config.openai_api_key.as_deref() else {
        tracing::warn!(event = "llm_unconfigured");
        return Ok(Gateway::unconfigured(settings));
    };

    let client = OpenAiClient::new(
        api_key,
        config.openai_base_url.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    Ok(Gateway::new(Arc::new(client), settings))
}

fn schema_provider(config: &Config) -> Result<SchemaProvider, CliError> {
    Ok(SchemaProvider::from_url(
        config.database_url.as_deref(),
        IntrospectOptions::default(),
    )?)
}

fn build_services(config: &Config) -> Result<Services, CliError> {
    let gateway = build_gateway(config)?;
    let schema: Arc<dyn SchemaSource> = Arc::new(schema_provider(config)?);

    let executor: Arc<dyn QueryExecutor> = match config.database_url.as_deref() {
        Some(url) => {
            let factory = ConnectionFactory::from_url(url)?;
            tracing::info!(event = "database_configured", connection = %factory.display());
            Arc::new(PostgresExecutor::new(factory))
        }
        None => {
            tracing::warn!(event = "database_unconfigured");
            Arc::new(DisconnectedExecutor)
        }
    };

    Ok(Services::new(schema, gateway, executor)
        .with_query_timeout(Duration::from_secs(config.query_timeout_secs)))
}
