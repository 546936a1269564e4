use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_decision_verdict::{
    analysis::{AnalysisEvent, AnalysisOrchestrator, AnalysisResponse, DecisionInput},
    config::{Config, LogFormat},
    langbase::LangbaseClient,
    server::{AppState, McpServer},
    storage::SqliteStorage,
};

#[derive(Parser)]
#[command(name = "mcp-decision-verdict")]
#[command(about = "Multi-agent decision audit over Langbase Pipes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    Serve,

    /// Analyse one decision and print the result as JSON
    Analyze {
        /// The decision being considered
        #[arg(short, long)]
        decision: String,

        /// Optional reasoning behind the decision
        #[arg(short, long)]
        reasoning: Option<String>,

        /// Print progress events as JSON lines while running
        #[arg(short, long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    // Initialize Langbase client
    let langbase = match LangbaseClient::new(&config.langbase, &config.request) {
        Ok(c) => {
            info!(base_url = %config.langbase.base_url, "Langbase client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Langbase client");
            return Err(e.into());
        }
    };

    ensure_pipes(&langbase, &config).await;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, langbase).await,
        Commands::Analyze {
            decision,
            reasoning,
            stream,
        } => {
            let mut input = DecisionInput::new(decision);
            if let Some(reasoning) = reasoning {
                input = input.with_reasoning(reasoning);
            }
            analyze(&config, langbase, input, stream).await
        }
    }
}

async fn serve(config: Config, langbase: LangbaseClient) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "MCP Decision Verdict Server starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(config, storage, Arc::new(langbase))?);
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn analyze(
    config: &Config,
    langbase: LangbaseClient,
    input: DecisionInput,
    stream: bool,
) -> anyhow::Result<()> {
    let orchestrator = AnalysisOrchestrator::from_config(Arc::new(langbase), config)?;

    let outcome = if stream {
        let (tx, mut rx) = mpsc::unbounded_channel::<AnalysisEvent>();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                }
            }
        });
        let result = orchestrator.analyze_with_observer(&input, &tx).await;
        drop(tx);
        printer.await?;
        result?
    } else {
        orchestrator.analyze(&input).await?
    };

    let response = AnalysisResponse::new(outcome);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Create or update the three pipes; failures are logged and start-up continues.
async fn ensure_pipes(langbase: &LangbaseClient, config: &Config) {
    info!("Ensuring required Langbase pipes exist...");

    let pipes = [
        (
            &config.pipes.orchestrator,
            "Decision decomposition into specialist missions",
            &config.pipes.reasoning_model,
        ),
        (
            &config.pipes.agent,
            "Specialist analysis of a decision",
            &config.pipes.reasoning_model,
        ),
        (
            &config.pipes.synthesis,
            "Synthesis of specialist reports into a verdict",
            &config.pipes.fast_model,
        ),
    ];

    for (name, description, model) in pipes {
        if let Err(e) = langbase.ensure_pipe(name, description, model).await {
            warn!(pipe = %name, error = %e, "Failed to ensure pipe exists");
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
