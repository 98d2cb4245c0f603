mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use guardrails::{InputScreen, OutputScreen, REDIRECT_SYSTEM_PROMPT};
use runtime::{
    EmptyToolHost, ITERATION_LIMIT_MARKER, McpClient, McpToolHost, Message, Provider, Session,
    ToolSpec, TurnStatus,
};
use uuid::Uuid;

use config::Config;
use error::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a requirements management advisor. You help with \
requirements engineering, traceability, verification, and related topics, using the \
connected tools to look up project data when relevant. Be concise and direct.";
const CONFIG_FILE: &str = "advisor.toml";

#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "A tool-calling requirements advisor", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Provider to use: claude, openai, or gemini
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// List the connected tool server's catalog
    Tools,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ADVISOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat { provider }) => cmd_chat(provider.as_deref()).await,
        Some(Commands::Tools) => cmd_tools().await,
        None => cmd_chat(None).await,
    }
}

async fn cmd_tools() -> Result<()> {
    let config = Config::load_or_default(CONFIG_FILE)?;
    let url = config.server_url()?;

    let client = McpClient::new();
    let catalog = client.connect(&url, &config.mcp.headers).await?;

    if catalog.is_empty() {
        println!("No tools available at {url}");
    } else {
        println!("{} tool(s) at {url}:\n", catalog.len());
        for spec in &catalog {
            print_tool(spec);
        }
    }

    client.close().await;
    Ok(())
}

fn print_tool(spec: &ToolSpec) {
    if spec.description.is_empty() {
        println!("  {}", spec.name);
    } else {
        println!("  {}: {}", spec.name, spec.description);
    }
}

async fn cmd_chat(provider_override: Option<&str>) -> Result<()> {
    println!("advisor v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_FILE)?;
    let kind = config.provider_kind(provider_override)?;
    let api_key = config.api_key(kind)?;
    let model = config.model();
    let options = config.turn_options();
    let call_timeout = options.call_timeout;

    let backend = Provider::new(kind, api_key, model);
    let input_screen = InputScreen::new(config.guardrails.clone());
    let output_screen = OutputScreen::new(config.guardrails.clone());

    let url = config.server_url()?;
    let client = Arc::new(McpClient::new());
    let catalog = client.connect(&url, &config.mcp.headers).await?;

    let conversation_id = Uuid::new_v4();
    tracing::info!(
        %conversation_id,
        provider = %backend,
        tools = catalog.len(),
        "chat session started"
    );
    println!("Conversation: {conversation_id}");
    println!("Provider: {backend}");
    println!("Tools: {} available from {url}", catalog.len());
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut history: Vec<Message> = Vec::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match run_screened_turn(
            input,
            &history,
            &backend,
            &client,
            call_timeout,
            &options,
            &input_screen,
            &output_screen,
        )
        .await
        {
            Ok((text, updated)) => {
                history = updated;
                println!("\n{text}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    client.close().await;
    println!("\nSession ended.");
    Ok(())
}

/// One guarded turn: screen the input, run the loop (without tools and with a
/// redirect prompt when the question is off-topic), screen the output.
#[allow(clippy::too_many_arguments)]
async fn run_screened_turn(
    input: &str,
    history: &[Message],
    backend: &Provider,
    client: &Arc<McpClient>,
    call_timeout: Duration,
    options: &runtime::TurnOptions,
    input_screen: &InputScreen,
    output_screen: &OutputScreen,
) -> Result<(String, Vec<Message>)> {
    let verdict = input_screen.screen(input)?;

    let outcome = if verdict.on_topic {
        let tools = McpToolHost::new(Arc::clone(client), call_timeout).await?;
        let session = Session::new(backend.clone(), tools)
            .with_system(SYSTEM_PROMPT)
            .with_options(options.clone());
        session.run_turn(history.to_vec(), input).await
    } else {
        let session = Session::new(backend.clone(), EmptyToolHost)
            .with_system(REDIRECT_SYSTEM_PROMPT)
            .with_options(options.clone());
        session.run_turn(history.to_vec(), input).await
    };

    match outcome {
        Ok(outcome) => {
            tracing::info!(
                status = ?outcome.status,
                iterations = outcome.iterations,
                tools_used = ?outcome.tools_used,
                input_tokens = outcome.usage.input_tokens,
                output_tokens = outcome.usage.output_tokens,
                "turn finished"
            );
            let text = match outcome.status {
                TurnStatus::Completed => outcome.final_text.unwrap_or_default(),
                TurnStatus::IterationLimitReached => ITERATION_LIMIT_MARKER.to_string(),
            };
            let redaction = output_screen.screen(&text);
            Ok((redaction.text, outcome.history))
        }
        Err(e) => {
            tracing::warn!(error = %e, "turn failed");
            Err(Error::Turn(e))
        }
    }
}
