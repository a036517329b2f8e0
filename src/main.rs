//! turnloop CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use turnloop::backend::BackendRouter;
use turnloop::cli::{ChatArgs, Cli, Commands};
use turnloop::config::EngineConfig;
use turnloop::engine::{ChunkSink, ContinuationController, TurnRequest, TurnStatus};
use turnloop::persist::directive::contains_directive;
use turnloop::store::{MemoryStore, MessageStore};
use turnloop::tools::{FnTool, InternalToolRegistry, ToolDispatcher, ToolParameters};
use turnloop::types::{ChatChunk, GenerationParams, SessionSettings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("turnloop=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
        Commands::Config => handle_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn handle_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load()?;
    match EngineConfig::default_path() {
        Some(path) => println!("config file: {}", path.display()),
        None => println!("config file: <no home directory>"),
    }
    for provider in config.provider_names() {
        let url = config.get_base_url(&provider).unwrap_or_else(|| "-".into());
        let key = if config.get_api_key(&provider).is_some() { "set" } else { "unset" };
        println!("{provider:<18} key {key:<5} {url}");
    }
    println!("{:#?}", config.loop_settings());
    Ok(())
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let Some(prompt) = args.prompt.clone() else {
        eprintln!("Usage: turnloop chat \"your prompt here\"");
        std::process::exit(1);
    };

    let config = EngineConfig::load()?;
    let model = args.model_ref();
    let backend = Arc::new(BackendRouter::from_config(&config));
    let store = Arc::new(MemoryStore::new());

    let settings = SessionSettings {
        system_prompt: args.system.clone(),
        params: GenerationParams {
            temperature: args.temperature,
            ..Default::default()
        },
        ..Default::default()
    };
    let session = store.create_session("cli", model, settings).await?;

    let mut registry = InternalToolRegistry::new();
    registry.register_grouped("time", Arc::new(clock_tool()));
    let controller = ContinuationController::new(
        backend,
        ToolDispatcher::internal_only(registry),
        store,
    )
    .with_settings(config.loop_settings());

    let (sink, mut client) = ChunkSink::channel();
    let show_tools = args.show_tools;
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(line) = client.next().await {
            let Ok(chunk) = serde_json::from_str::<ChatChunk>(line.trim_end()) else {
                continue;
            };
            if let Some(text) = chunk.content_text() {
                if show_tools || !contains_directive(text) {
                    let _ = write!(stdout, "{text}");
                    let _ = stdout.flush();
                }
            }
        }
    });

    let request = TurnRequest::builder()
        .session_id(session.id)
        .user_message(prompt)
        .use_tools(!args.no_tools)
        .build();
    let outcome = controller.run_turn(request, sink).await?;
    let _ = printer.await;
    println!();

    tracing::debug!(?outcome, "turn outcome");
    if let TurnStatus::Failed(message) = outcome.status {
        return Err(message.into());
    }
    Ok(())
}

/// `internal_time_now`: the current UTC time.
fn clock_tool() -> FnTool {
    FnTool::new(
        "now",
        "Current date and time in UTC (RFC 3339)",
        ToolParameters::empty(),
        |_args, _ctx| async move {
            Ok(serde_json::json!({ "utc": chrono::Utc::now().to_rfc3339() }))
        },
    )
}
