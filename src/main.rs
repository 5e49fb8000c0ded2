//! # opsdesk CLI
//!
//! ```bash
//! opsdesk --config ./config/opsdesk.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `opsdesk init` | Create the local SQLite schema |
//! | `opsdesk ingest` | Ingest new PDFs from the configured folder |
//! | `opsdesk ask "<question>"` | Answer one question |
//! | `opsdesk chat` | Interactive chat |
//! | `opsdesk serve` | Start the HTTP API |
//! | `opsdesk hash-passphrase <passphrase>` | Print the digest for `[access]` |
//! | `opsdesk completions <shell>` | Shell completion script |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use opsdesk::progress::ProgressMode;
use opsdesk::{ask, auth, chat, config, ingest, migrate, server};

/// opsdesk: ask questions about a folder of PDF regulations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/opsdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "opsdesk",
    about = "opsdesk: retrieval-augmented answers over a folder of PDF regulations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/opsdesk.toml`. When the default file is absent,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/opsdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local SQLite schema (idempotent).
    Init,

    /// Ingest PDFs from the ingest folder.
    ///
    /// Files whose name is already present in the store are skipped.
    Ingest {
        /// Folder to scan instead of `[ingest].folder`.
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Show file and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output on stderr. Defaults to `human` on a TTY, otherwise `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat in the terminal.
    Chat,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print the HMAC digest of a passphrase for `[access].passphrase_digest`.
    HashPassphrase {
        passphrase: String,

        /// Salt to use instead of `[access].salt`.
        #[arg(long)]
        salt: Option<String>,
    },

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsdesk=info,opsdesk_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &std::path::Path) -> anyhow::Result<config::Config> {
    if !path.exists() && path == std::path::Path::new("./config/opsdesk.toml") {
        return Ok(config::Config::minimal());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "opsdesk",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            folder,
            dry_run,
            limit,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, folder, dry_run, limit, mode).await?;
        }
        Commands::Ask { question, json } => {
            ask::run_ask(&cfg, &question, json).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::HashPassphrase { passphrase, salt } => {
            let salt = salt.unwrap_or_else(|| cfg.access.salt.clone());
            println!("{}", auth::passphrase_digest(&salt, &passphrase));
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
