use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use stride_config::StrideConfig;
use stride_core::Resolution;
use stride_llm::OpenRouterClient;
use stride_runtime::{nudge_preview, Coach, Repository};
use stride_store::{KvStore, MemoryStore, RedbStore};

#[derive(Debug, Parser)]
#[command(
    name = "stride",
    version,
    about = "A resolution coach that lives in your terminal"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "stride.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat with the coach (default).
    Chat {
        /// Session id; turns in the same session share a transcript for 24h.
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// List stored resolutions.
    List {
        /// Filter: active, completed, or all.
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Show one resolution with its full update log.
    Show {
        id: Uuid,
    },
    /// Report what the nudge engine would do right now, without delivering.
    NudgeCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = StrideConfig::load_or_default(&cli.config)?.with_env_overrides();
    let store = open_store(&config)?;

    match cli.command.unwrap_or(Commands::Chat {
        session: "default".to_string(),
    }) {
        Commands::Chat { session } => run_chat(&config, store, &session).await,
        Commands::List { status } => run_list(store, &status).await,
        Commands::Show { id } => run_show(store, id).await,
        Commands::NudgeCheck => run_nudge_check(store).await,
    }
}

fn open_store(config: &StrideConfig) -> Result<Arc<dyn KvStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "redb" => {
            let store = RedbStore::open(&config.store.path)
                .with_context(|| format!("opening store at {}", config.store.path))?;
            Ok(Arc::new(store))
        }
        other => bail!("unknown store backend \"{other}\" (expected \"redb\" or \"memory\")"),
    }
}

async fn run_chat(config: &StrideConfig, store: Arc<dyn KvStore>, session: &str) -> Result<()> {
    if config.llm.provider != "openrouter" {
        bail!(
            "unsupported LLM provider \"{}\" (only \"openrouter\" is wired up)",
            config.llm.provider
        );
    }
    let client = Arc::new(OpenRouterClient::from_env(config.llm.model.clone())?);
    let coach = Coach::new(
        store,
        client,
        config.agent.name.clone(),
        config.agent.user_name.clone(),
    );

    let interactive = io::stdin().is_terminal();
    if interactive {
        println!("{} — type your message, or 'exit' to quit.", config.agent.name);
    }

    let stdin = io::stdin();
    loop {
        if interactive {
            print!("you> ");
            io::stdout().flush()?;
        }
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        match coach.chat(session, message).await {
            Ok(turn) => {
                println!("{}> {}", config.agent.name, turn.reply);
                if !turn.tools_used.is_empty() {
                    println!("  [tools: {}]", turn.tools_used.join(", "));
                }
            }
            Err(err) => eprintln!("turn failed: {err:#}"),
        }
    }
    Ok(())
}

async fn run_list(store: Arc<dyn KvStore>, status: &str) -> Result<()> {
    let repository = Repository::new(store);
    let loaded = repository.load_resolutions().await?;

    let matching: Vec<&Resolution> = loaded
        .set
        .iter()
        .filter(|r| match status {
            "active" => r.is_active(),
            "completed" => !r.is_active(),
            _ => true,
        })
        .collect();

    if matching.is_empty() {
        println!("no resolutions");
        return Ok(());
    }
    for resolution in matching {
        println!(
            "  {}  [{}]  {} — {} ({} updates)",
            resolution.id,
            if resolution.is_active() { "active" } else { "done" },
            resolution.title,
            resolution.measurable_criteria,
            resolution.updates.len(),
        );
    }
    Ok(())
}

async fn run_show(store: Arc<dyn KvStore>, id: Uuid) -> Result<()> {
    let repository = Repository::new(store);
    let loaded = repository.load_resolutions().await?;
    let Some(resolution) = loaded.set.get(&id) else {
        bail!("no resolution with id {id}");
    };

    println!("{}", resolution.title);
    println!("  criteria   : {}", resolution.measurable_criteria);
    if let Some(context) = &resolution.context {
        println!("  context    : {context}");
    }
    println!(
        "  status     : {}",
        if resolution.is_active() { "active" } else { "completed" }
    );
    println!("  created    : {}", resolution.created_at.format("%Y-%m-%d"));
    println!(
        "  nudges     : {} sent, response rate {:.0}%",
        resolution.update_settings.nudge_count,
        resolution.update_settings.response_rate * 100.0,
    );
    if resolution.updates.is_empty() {
        println!("  no updates yet");
        return Ok(());
    }
    println!("  updates:");
    for update in &resolution.updates {
        println!(
            "    {}  {:?}  {}",
            update.created_at.format("%Y-%m-%d"),
            update.kind,
            update.content,
        );
    }
    Ok(())
}

async fn run_nudge_check(store: Arc<dyn KvStore>) -> Result<()> {
    let repository = Repository::new(store);
    match nudge_preview(&repository).await {
        Some(decision) => {
            println!("would nudge: {}", decision.resolution_title);
            println!("  type   : {}", decision.kind.as_str());
            println!("  reason : {}", decision.reason);
            match decision.days_since_last_nudge {
                Some(days) => println!("  last nudge: {days} days ago"),
                None => println!("  last nudge: never"),
            }
        }
        None => println!("no nudge right now"),
    }
    Ok(())
}
