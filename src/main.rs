use std::sync::Arc;

use futures::StreamExt;
use tracing::warn;
use uuid::Uuid;

use signup_flow::config::AppConfig;
use signup_flow::console::{self, Command, StdoutCompletionSink};
use signup_flow::error::WorkflowError;
use signup_flow::flows::{RegistrationKind, unique_field_kind};
use signup_flow::store::{LibSqlSnapshotStore, SnapshotStore};
use signup_flow::validation::{
    DebouncedValidator, HttpUniquenessChecker, InMemoryUniquenessChecker, UniquenessChecker,
};
use signup_flow::workflow::{
    EngineDeps, FormData, SnapshotPersistence, StepOutcome, WorkflowEngine, snapshot_key,
};

const USAGE: &str = "Usage: signup-flow <customer|restaurant|delivery-agent> [session-id]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let kind: RegistrationKind = match args.next() {
        Some(arg) => arg.parse()?,
        None => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    let session = args.next().unwrap_or_else(|| Uuid::new_v4().to_string());

    let config = AppConfig::from_env()?;

    // ── Snapshot store ───────────────────────────────────────────────────
    let store: Arc<dyn SnapshotStore> =
        Arc::new(LibSqlSnapshotStore::new_local(&config.db_path).await?);

    // ── Availability checks ──────────────────────────────────────────────
    let checker: Arc<dyn UniquenessChecker> = match &config.check_url {
        Some(url) => Arc::new(HttpUniquenessChecker::new(url.clone())),
        None => {
            warn!("SIGNUP_CHECK_URL not set, checking availability against an empty in-memory set");
            Arc::new(InMemoryUniquenessChecker::new())
        }
    };
    let validator = DebouncedValidator::new(checker, config.validator.clone());
    let _watchers = console::spawn_status_watchers(&validator);

    // ── Engine ───────────────────────────────────────────────────────────
    let registry = kind.registry(&validator)?;
    let persistence = SnapshotPersistence::new(store, snapshot_key(kind.as_str(), &session));
    let engine = WorkflowEngine::resume(
        registry,
        EngineDeps::new(persistence, Arc::new(StdoutCompletionSink)),
    )
    .await;

    eprintln!("📝 Signup Flow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Registration: {}", kind);
    eprintln!("   Session: {}  (pass it again to resume)", session);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Type :help for commands.\n");
    show_step(&engine).await;

    let mut input = console::stdin_lines();
    while let Some(line) = input.next().await {
        let command = match console::parse_command(&line) {
            Ok(command) => command,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };

        match command {
            Command::Set { field, value } => {
                if let (Some(kind), Some(text)) = (unique_field_kind(&field), value.as_str()) {
                    validator.check_field(kind, text);
                }
                let mut partial = FormData::new();
                partial.insert(field, value);
                if let Err(e) = engine.update_data(partial).await {
                    eprintln!("{e}");
                }
            }
            Command::Next => report(&engine, engine.advance().await).await,
            Command::Back => report(&engine, engine.retreat().await).await,
            Command::Skip => report(&engine, engine.skip_optional().await).await,
            Command::Jump(index) => report(&engine, engine.jump_to(index).await).await,
            Command::Status => {
                let status = engine.status().await;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            Command::Reset => match engine.reset().await {
                Ok(()) => {
                    eprintln!("Registration reset.");
                    show_step(&engine).await;
                }
                Err(e) => eprintln!("{e}"),
            },
            Command::Help => eprintln!("{}", console::HELP),
            Command::Quit => break,
        }

        if engine.is_completed().await {
            eprintln!("🎉 Registration complete.");
            break;
        }
    }

    Ok(())
}

async fn show_step(engine: &WorkflowEngine) {
    let status = engine.status().await;
    let step = engine.current_step().await;
    let data = engine.data().await;
    eprintln!("{}", console::describe_step(&status, &step, &data));
}

async fn report(engine: &WorkflowEngine, outcome: Result<StepOutcome, WorkflowError>) {
    match outcome {
        Ok(StepOutcome::Moved { .. }) => show_step(engine).await,
        Ok(StepOutcome::Completed { .. }) => {}
        Err(WorkflowError::Validation { result, .. }) => {
            for (field, message) in &result.errors {
                eprintln!("  ! {field}: {message}");
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}
