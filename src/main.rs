//! Sentra - a natural-language analytics agent over Athena catalogs.

use std::process::ExitCode;

use anyhow::{bail, Context};
use sentra_agent::app::AppContext;
use sentra_agent::catalog::{CatalogRegistry, SchemaSync};
use sentra_agent::cli::{Cli, Command, MemoryCommand};
use sentra_agent::config::Config;
use sentra_agent::llm::AgentRequest;
use sentra_agent::logging::{init_file_logging, init_stderr_logging};
use sentra_agent::memory::ActorId;
use sentra_agent::safety::{ensure_read_only, scope_sql};
use sentra_agent::server;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    match &config.logging.file {
        Some(path) => init_file_logging(path),
        None => init_stderr_logging(),
    }
    info!(path = %config_path.display(), mock = cli.mock, "Loaded configuration");

    let ctx = AppContext::load(config, cli.mock).await;

    match cli.command {
        Command::Serve { bind } => serve(&ctx, bind).await,
        Command::Ask {
            user,
            session,
            question,
        } => {
            let agent = ctx.agent().await?;
            let request = AgentRequest {
                user_query: question.join(" "),
                user_id: user,
                session_id: session,
            };
            let response = agent.ask(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Query { catalog, user, sql } => query(&ctx, &catalog, user.as_deref(), &sql).await,
        Command::Login { username, password } => {
            let tokens = ctx.identity()?.login(&username, &password).await?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            Ok(())
        }
        Command::Memory { command } => memory(&ctx, command).await,
        Command::SyncSchema { database, table } => {
            let sync = SchemaSync::new(ctx.schema_catalog()?, ctx.memory_store().await?);
            let report = sync.run(&database, &table).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(ctx: &AppContext, bind: Option<String>) -> anyhow::Result<()> {
    let state = ctx.app_state().await?;
    let addr = bind.unwrap_or_else(|| ctx.config().server.bind_addr());

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            token.cancel();
        }
    });

    server::serve(&addr, state, shutdown).await?;
    Ok(())
}

async fn query(
    ctx: &AppContext,
    catalog: &str,
    user: Option<&str>,
    sql: &str,
) -> anyhow::Result<()> {
    let registry = CatalogRegistry::new(ctx.config().catalogs.clone());
    let catalog = registry.require(catalog)?;
    ensure_read_only(sql)?;

    let sql = match user {
        Some(user) => scope_sql(sql, &registry, catalog, &ctx.config().access.scope_for(user))?,
        None => sql.to_string(),
    };

    let outcome = ctx.executor()?.run(&sql, &catalog.name).await?;
    match outcome.rows() {
        Some(rows) => {
            eprintln!("execution_id: {}", outcome.handle());
            println!("{}", serde_json::to_string_pretty(rows)?);
            Ok(())
        }
        None => bail!(
            "{} (execution_id: {})",
            outcome.failure_message().unwrap_or_default(),
            outcome.handle()
        ),
    }
}

async fn memory(ctx: &AppContext, command: MemoryCommand) -> anyhow::Result<()> {
    let store = ctx.memory_store().await?;

    match command {
        MemoryCommand::Turns { actor, session, k } => {
            let actor = ActorId::sanitize(&actor)?;
            let turns = store.last_k_turns(&actor, &session, k).await?;
            if turns.is_empty() {
                println!("No turns recorded for {actor} / {session}");
            }
            for (i, turn) in turns.iter().enumerate() {
                println!("--- turn {} ---", i + 1);
                for message in turn {
                    println!("{}: {}", message.role, message.text);
                }
            }
        }
        MemoryCommand::Sessions { actor } => {
            let actor = ActorId::sanitize(&actor)?;
            for session in store.list_sessions(&actor).await? {
                println!("{}", session.session_id);
            }
        }
        MemoryCommand::Clear { actor, session } => {
            let actor = ActorId::sanitize(&actor)?;
            let events = store.list_events(&actor, &session).await?;
            for event in &events {
                store.delete_event(&actor, &session, &event.event_id).await?;
            }
            println!("Deleted {} events from {actor} / {session}", events.len());
        }
    }

    Ok(())
}
