//! Chat with a model, or summarize a web page or a video transcript.
//!
//! Reads the API key from `OPENAI_API_KEY`; `OPENAI_BASE_URL` points the
//! client at any OpenAI-compatible server.
//!
//! # Examples
//!
//! ```sh
//! # Summarize a web page in about 300 characters
//! brief web https://example.com/article
//!
//! # Summarize a saved transcript with the 16k model, showing the source
//! brief --model GPT-3.5-16k video talk.txt --show-source
//!
//! # One chat turn, or an interactive session without --message
//! brief --temperature 0.7 chat --message "What is a borrow checker?"
//! ```

use std::io::Write as _;
use std::process;
use std::time::Duration;

use brief_rs::accounting::format_usd;
use brief_rs::api::ChatClient;
use brief_rs::events::{EventHandler, LoggingHandler, SummarizeEvent};
use brief_rs::llm::LlmClient;
use brief_rs::session::{Session, SourcedSummary};
use brief_rs::source::{FileTranscriptLoader, HttpContentFetcher};
use brief_rs::summarize::StrategyHint;
use brief_rs::{BriefError, ModelChoice, ModelRegistry, PipelineConfig};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Chat with a model, or summarize a web page or a video transcript.
///
/// Reads the API key from the OPENAI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "brief", version)]
struct Cli {
    // ── Model selection ────────────────────────────────────────
    /// Model: GPT-3.5, GPT-3.5-16k, GPT-4, GPT-4-32k, or any registered id
    #[arg(long, global = true, default_value = "GPT-3.5")]
    model: String,

    /// JSON file with extra model profiles
    #[arg(long, global = true)]
    models_file: Option<String>,

    // ── Sampling and budget ────────────────────────────────────
    /// Sampling temperature (0.0 – 2.0)
    #[arg(long, global = true, default_value_t = 0.0)]
    temperature: f32,

    /// Tokens of the context window kept free for prompt and reply
    #[arg(long, global = true, default_value_t = 1000)]
    reserve: usize,

    /// Tokens shared between consecutive chunks
    #[arg(long, global = true, default_value_t = 0)]
    overlap: usize,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Collapse rounds allowed before a summary is abandoned
    #[arg(long, global = true, default_value_t = 8)]
    max_collapse_rounds: usize,

    // ── Output ─────────────────────────────────────────────────
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to the model. Reads lines from stdin unless --message is given.
    Chat {
        /// Send one message and exit
        #[arg(long)]
        message: Option<String>,
    },
    /// Summarize the text of a web page
    Web {
        url: String,

        /// Target summary length in characters
        #[arg(long, default_value_t = 300)]
        chars: usize,

        /// Also print the extracted page text
        #[arg(long)]
        show_source: bool,

        /// Use map-reduce even when the page fits in one call
        #[arg(long)]
        force_map_reduce: bool,
    },
    /// Summarize a video transcript saved as a text file
    Video {
        transcript: String,

        /// Also print the transcript
        #[arg(long)]
        show_source: bool,

        /// Use map-reduce even when the transcript fits in one call
        #[arg(long)]
        force_map_reduce: bool,
    },
}

// ── Setup ──────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,brief_rs=info",
        2 => "info,brief_rs=debug",
        _ => "debug,brief_rs=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_registry(models_file: Option<&str>) -> Result<ModelRegistry, String> {
    let registry = ModelRegistry::builtin();
    match models_file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read models file '{path}': {e}"))?;
            registry.with_profiles_json(&json).map_err(|e| e.to_string())
        }
        None => Ok(registry),
    }
}

/// Accept the menu labels and ids of the built-in models as well as any
/// id registered from a models file.
fn resolve_model(arg: &str) -> String {
    arg.parse::<ModelChoice>()
        .map(|choice| choice.id().to_string())
        .unwrap_or_else(|_| arg.to_string())
}

fn build_config(cli: &Cli) -> PipelineConfig {
    let mut config = PipelineConfig::default()
        .with_model_id(resolve_model(&cli.model))
        .with_temperature(cli.temperature)
        .with_reserve(cli.reserve)
        .with_overlap(cli.overlap)
        .with_max_collapse_rounds(cli.max_collapse_rounds);
    if let Some(secs) = cli.timeout_secs {
        config = config.with_call_timeout(Duration::from_secs(secs));
    }
    match cli.command {
        Command::Web {
            chars,
            force_map_reduce,
            ..
        } => {
            config = config.with_web_summary_chars(chars);
            if force_map_reduce {
                config = config.with_strategy_hint(StrategyHint::ForceMapReduce);
            }
        }
        Command::Video {
            force_map_reduce: true,
            ..
        } => config = config.with_strategy_hint(StrategyHint::ForceMapReduce),
        _ => {}
    }
    config
}

/// Prints map-reduce progress to stderr.
struct CliEventHandler;

impl EventHandler for CliEventHandler {
    fn on_event(&self, event: &SummarizeEvent) {
        match event {
            SummarizeEvent::StrategySelected {
                strategy,
                document_tokens,
                budget,
            } => eprintln!("  [{strategy}] ~{document_tokens} tokens, budget {budget}"),
            SummarizeEvent::ChunkSummarized {
                round,
                sequence_index,
                chunks,
            } => eprintln!("  [round {round}] chunk {}/{chunks}", sequence_index + 1),
            _ => {}
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────

/// Per-call costs and the session total, one line each.
fn cost_report(session: &Session) -> String {
    let mut report = String::new();
    for (i, cost) in session.costs().costs().enumerate() {
        report.push_str(&format!("  call {}: {}\n", i + 1, format_usd(cost)));
    }
    report.push_str(&format!("Total cost: {}\n", format_usd(session.total_cost())));
    report
}

fn print_costs(session: &Session) {
    eprint!("{}", cost_report(session));
}

fn print_summary(result: &SourcedSummary, show_source: bool) {
    if show_source {
        if let Some(title) = result.document.title() {
            println!("# {title}\n");
        }
        println!("## Summary\n\n{}\n", result.outcome.summary);
        println!("---\n\n## Source\n\n{}", result.document.text);
    } else {
        println!("{}", result.outcome.summary);
    }
}

async fn run_chat(
    session: &mut Session,
    client: &dyn LlmClient,
    message: Option<String>,
) -> brief_rs::Result<()> {
    if let Some(message) = message {
        let turn = session.chat(client, &message).await?;
        println!("{}", turn.reply);
        return Ok(());
    }

    eprintln!("Type a message. /clear resets the conversation and costs, /costs lists them.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read stdin: {e}");
                break;
            }
        };
        match line.trim() {
            "" => continue,
            "/clear" => {
                session.reset();
                eprintln!("  conversation cleared");
            }
            "/costs" => print_costs(session),
            input => match session.chat(client, input).await {
                Ok(turn) => println!("{}\n", turn.reply),
                // A failed turn leaves the history as it was; keep going.
                Err(e) => eprintln!("Error: {e}"),
            },
        }
    }
    Ok(())
}

async fn execute(
    command: Command,
    session: &mut Session,
    client: &dyn LlmClient,
) -> brief_rs::Result<()> {
    match command {
        Command::Chat { message } => run_chat(session, client, message).await,
        Command::Web {
            url, show_source, ..
        } => {
            let fetcher = HttpContentFetcher::new()?;
            let result = session.summarize_web(client, &fetcher, &url).await?;
            print_summary(&result, show_source);
            Ok(())
        }
        Command::Video {
            transcript,
            show_source,
            ..
        } => {
            let result = session
                .summarize_video(client, &FileTranscriptLoader::new(), &transcript)
                .await?;
            print_summary(&result, show_source);
            Ok(())
        }
    }
}

async fn run(cli: Cli) -> brief_rs::Result<()> {
    let registry = load_registry(cli.models_file.as_deref())
        .map_err(|reason| BriefError::InvalidProfile {
            id: cli.models_file.clone().unwrap_or_default(),
            reason,
        })?;
    let config = build_config(&cli);
    let client = ChatClient::from_env()?;

    let mut session = if cli.verbose > 0 {
        Session::new(registry, config).with_event_handler(LoggingHandler)
    } else {
        Session::new(registry, config).with_event_handler(CliEventHandler)
    };
    // Fail on an unknown model before any network traffic.
    session.accountant().registry().resolve(&session.config().model)?;

    let result = execute(cli.command, &mut session, &client).await;
    // Calls that completed before a failure were still paid for.
    if result.is_ok() || !session.costs().is_empty() {
        print_costs(&session);
    }
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => {}
        Err(e) if e.is_content_unavailable() => {
            eprintln!("Nothing to summarize: {e}");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
