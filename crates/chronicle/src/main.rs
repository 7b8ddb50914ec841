//! Command-line access to the chronicle memory store.

use anyhow::Context;
use chronicle::config::ChronicleConfig;
use chronicle::memory::{
    ConversationMessage, MemoryEntry, MemoryRegistry, clean_conversation, crop_conversation,
    render_messages,
};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line options for the memory store.
#[derive(Debug, Parser)]
#[command(name = "chronicle", version, about = "Per-session conversation memory")]
struct Cli {
    /// Optional path to a chronicle.json5 config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a conversation and print the compacted transcript
    Process {
        /// Session identifier
        #[arg(long)]
        session: String,
        /// JSON array of `{role, name?, content}` messages
        #[arg(long)]
        conversation: PathBuf,
        /// Name given to user messages without one
        #[arg(long, default_value = "Player")]
        default_name: String,
        /// Skip memory and crop to `memory.fallback_characters`
        #[arg(long)]
        stateless: bool,
    },
    /// Append a single raw entry
    Append {
        #[arg(long)]
        session: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        content: String,
    },
    /// Print the stored entries of a session
    Show {
        #[arg(long)]
        session: String,
    },
    /// Run one compaction pass over a session
    Compact {
        #[arg(long)]
        session: String,
    },
    /// Delete one session, or every session when none is given
    Prune {
        #[arg(long)]
        session: Option<String>,
    },
}

/// Entry point for the chronicle CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chronicle::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Command::Process {
        conversation,
        default_name,
        stateless: true,
        ..
    } = &cli.command
    {
        let messages = read_conversation(conversation, default_name)?;
        let cropped = crop_conversation(&messages, config.memory.fallback_characters);
        println!("{}", render_messages(cropped));
        return Ok(());
    }

    let registry = chronicle::open_registry(&config).context("failed to open memory store")?;
    let result = run(&registry, &config, cli.command).await;
    let closed = registry.close().context("failed to close memory store");
    result?;
    closed
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ChronicleConfig> {
    if let Some(path) = path {
        return ChronicleConfig::load_from_path(path).context("failed to load config");
    }
    let cwd = std::env::current_dir().context("cwd")?;
    let layered = ChronicleConfig::load_layered(&cwd).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

fn read_conversation(
    path: &Path,
    default_name: &str,
) -> anyhow::Result<Vec<ConversationMessage>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read conversation {}", path.display()))?;
    let messages: Vec<ConversationMessage> = serde_json::from_str(&contents)
        .context("conversation must be a JSON array of messages")?;
    Ok(clean_conversation(messages, default_name))
}

async fn run(
    registry: &MemoryRegistry,
    config: &ChronicleConfig,
    command: Command,
) -> anyhow::Result<()> {
    let memory = registry
        .get(&config.memory_settings())
        .context("failed to build summarizer")?;

    match command {
        Command::Process {
            session,
            conversation,
            default_name,
            ..
        } => {
            let messages = read_conversation(&conversation, &default_name)?;
            info!(
                "processing conversation (session_id={}, messages={})",
                session,
                messages.len()
            );
            let transcript = memory.process(&session, &messages).await?;
            println!("{transcript}");
        }
        Command::Append {
            session,
            author,
            content,
        } => {
            let entry = memory.append_raw(&session, &author, &content).await?;
            println!("{}", format_entry(&entry));
        }
        Command::Show { session } => {
            for entry in memory.entries(&session)? {
                println!("{}", format_entry(&entry));
            }
        }
        Command::Compact { session } => {
            let pass = memory.compact(&session).await?;
            for failure in &pass.failures {
                warn!("summary failed (session_id={}, error={})", session, failure);
            }
            println!(
                "compacted {} run(s), {} failure(s), {} entries remain",
                pass.compacted,
                pass.failures.len(),
                pass.entries.len()
            );
        }
        Command::Prune { session } => {
            let deleted = memory.prune(session.as_deref()).await?;
            println!("deleted {deleted} entries");
        }
    }
    Ok(())
}

/// `id level timestamp author: content`
fn format_entry(entry: &MemoryEntry) -> String {
    let timestamp = DateTime::from_timestamp_millis(entry.timestamp_ms)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| entry.timestamp_ms.to_string());
    format!(
        "{} {} {} {}",
        entry.id,
        entry.level,
        timestamp,
        entry.line()
    )
}
