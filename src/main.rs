//! # Snipvault CLI (`snipvault`)
//!
//! The `snipvault` binary initializes the database, serves the HTTP API, and
//! drives the snippet service directly from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! snipvault --config ./config/snipvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `snipvault init` | Create the SQLite database and schema |
//! | `snipvault serve` | Start the HTTP API |
//! | `snipvault add` | Save a new snippet |
//! | `snipvault list` | Keyword listing, newest first |
//! | `snipvault search "<query>"` | Semantic search |
//! | `snipvault get <id>` | Print one snippet |
//! | `snipvault update <id>` | Change fields of a snippet |
//! | `snipvault delete <id>` | Remove a snippet |
//! | `snipvault explain <id>` | Ask the AI assistant to explain a snippet |
//! | `snipvault completions <shell>` | Print a shell completion script |
//!
//! Snippet commands act on behalf of the owner given by `--owner` or the
//! `SNIPVAULT_OWNER` environment variable.
//!
//! ## Examples
//!
//! ```bash
//! snipvault init
//! snipvault add --owner me --title "Retry loop" --language rust --tag http --file retry.rs
//! snipvault list --owner me --tag http
//! snipvault search --owner me "exponential backoff"
//! snipvault serve
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use snipvault::config::{self, Config};
use snipvault::factory::{AppContext, AppFactory};
use snipvault::{migrate, server};
use snipvault_core::models::{ListQuery, NewSnippet, SemanticQuery, SnippetPatch};

/// Snipvault: a personal code-snippet manager with keyword and semantic
/// retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/snipvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "snipvault",
    about = "Snipvault: store, search and explain your code snippets",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/snipvault.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OwnerArg {
    /// Owner the command acts for.
    #[arg(long, env = "SNIPVAULT_OWNER")]
    owner: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the snippets, snippet_vectors
    /// and cache_entries tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Save a new snippet.
    ///
    /// The code is taken from `--code`, `--file`, or standard input.
    Add {
        #[command(flatten)]
        owner: OwnerArg,

        #[arg(long)]
        title: String,

        #[arg(long, conflicts_with = "file")]
        code: Option<String>,

        /// Read the code from this file.
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        framework: Option<String>,

        /// Tag to attach (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        summary: Option<String>,
    },

    /// List snippets, newest first.
    List {
        #[command(flatten)]
        owner: OwnerArg,

        /// Case-insensitive substring of the title or code.
        #[arg(long)]
        query: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Semantic search, best match first.
    Search {
        #[command(flatten)]
        owner: OwnerArg,

        query: String,
    },

    /// Print a snippet by id.
    Get {
        #[command(flatten)]
        owner: OwnerArg,

        id: String,
    },

    /// Change fields of an existing snippet.
    Update {
        #[command(flatten)]
        owner: OwnerArg,

        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "file")]
        code: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        framework: Option<String>,

        /// Replace the tag set (repeatable).
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,

        #[arg(long)]
        summary: Option<String>,
    },

    /// Delete a snippet.
    Delete {
        #[command(flatten)]
        owner: OwnerArg,

        id: String,
    },

    /// Explain a stored snippet with the configured AI assistant.
    Explain {
        #[command(flatten)]
        owner: OwnerArg,

        id: String,
    },

    /// Print a shell completion script to stdout.
    Completions { shell: Shell },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "snipvault=debug,snipvault_core=debug,tower_http=debug"
    } else {
        "snipvault=info,snipvault_core=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_code(code: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    if let Some(code) = code {
        return Ok(Some(code));
    }
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => Ok(None),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read code from stdin")?;
    Ok(buf)
}

async fn context(cfg: &Config) -> Result<AppContext> {
    AppFactory::create_context(cfg).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "snipvault",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Add {
            owner,
            title,
            code,
            file,
            language,
            framework,
            tags,
            summary,
        } => {
            let code = match read_code(code, file)? {
                Some(code) => code,
                None => read_stdin()?,
            };
            let input = NewSnippet {
                language,
                framework,
                tags: Some(tags),
                summary,
                ..NewSnippet::new(title, code)
            };
            let ctx = context(&cfg).await?;
            let snippet = ctx.service.create_snippet(&owner.owner, input).await?;
            print_json(&snippet)?;
        }
        Commands::List {
            owner,
            query,
            tag,
            page,
            limit,
        } => {
            let ctx = context(&cfg).await?;
            let page = ctx
                .service
                .get_all_snippets(
                    &owner.owner,
                    ListQuery {
                        q: query,
                        tag,
                        page,
                        limit,
                    },
                )
                .await?;
            print_json(&page)?;
        }
        Commands::Search { owner, query } => {
            let ctx = context(&cfg).await?;
            let page = ctx
                .service
                .semantic_search(&owner.owner, SemanticQuery { q: Some(query) })
                .await?;
            print_json(&page)?;
        }
        Commands::Get { owner, id } => {
            let ctx = context(&cfg).await?;
            let snippet = ctx.service.get_snippet_by_id(&owner.owner, &id).await?;
            print_json(&snippet)?;
        }
        Commands::Update {
            owner,
            id,
            title,
            code,
            file,
            language,
            framework,
            tags,
            summary,
        } => {
            let patch = SnippetPatch {
                title,
                code: read_code(code, file)?,
                language: language.map(Some),
                framework: framework.map(Some),
                tags,
                summary: summary.map(Some),
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass at least one field option");
            }
            let ctx = context(&cfg).await?;
            let snippet = ctx.service.update_snippet(&owner.owner, &id, patch).await?;
            print_json(&snippet)?;
        }
        Commands::Delete { owner, id } => {
            let ctx = context(&cfg).await?;
            ctx.service.delete_snippet(&owner.owner, &id).await?;
            println!("Deleted {id}");
        }
        Commands::Explain { owner, id } => {
            let ctx = context(&cfg).await?;
            let snippet = ctx.service.get_snippet_by_id(&owner.owner, &id).await?;
            let explanation = ctx.assistant.explain(&snippet.code).await?;
            println!("{explanation}");
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
