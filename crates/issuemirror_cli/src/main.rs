//! Issuemirror CLI - command-line interface for mirroring GitHub issues into a forum.

mod commands;
mod config;
#[cfg(feature = "github")]
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;
#[cfg(feature = "github")]
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "issuemirror")]
#[command(version)]
#[command(about = "Mirror GitHub issues into forum topics")]
#[command(
    long_about = "Issuemirror replays the timeline of GitHub issues into a forum database: \
issues become topics, comments become replies, and close, reopen and rename events \
become small action posts. Every mirrored record is keyed by its GitHub node id, so \
syncing again only adds what is missing."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync one issue, creating the repository's category:
        $ issuemirror sync issue rust-lang/rust 101 --repo-id MDEwOlJlcG9zaXRvcnk3MjQ3MTI=

    Sync every issue of a repository:
        $ issuemirror sync repo rust-lang/rust

    Re-sync every mapped repository:
        $ issuemirror sync all

    Push a topic started on the forum to GitHub:
        $ issuemirror mirror topic 5f0c...

CONFIGURATION
    Issuemirror reads configuration from:
      1. ~/.config/issuemirror/config.toml (or $XDG_CONFIG_HOME/issuemirror/config.toml)
      2. ./issuemirror.toml
      3. Environment variables (ISSUEMIRROR_* prefix, e.g., ISSUEMIRROR_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    ISSUEMIRROR_DATABASE_URL   Database connection string (default: ~/.local/state/issuemirror/issuemirror.db)
    ISSUEMIRROR_GITHUB_TOKEN   GitHub personal access token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Repository to category mappings
    Categories {
        #[command(subcommand)]
        action: CategoriesAction,
    },
    /// Mirror GitHub issues into the forum
    #[cfg(feature = "github")]
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Mirror forum activity back to GitHub
    #[cfg(feature = "github")]
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show applied and pending migrations
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh {
        /// Confirm dropping all mirrored data
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CategoriesAction {
    /// List mapped repositories and their categories
    List,
    /// Find or create the category for a repository
    Ensure {
        /// Repository as owner/name
        repo: String,

        /// GitHub node id of the repository (required to create a category)
        #[arg(short = 'i', long)]
        repo_id: Option<String>,

        /// Map the repository's commits instead of its issues
        #[arg(long)]
        commits: bool,
    },
}

#[cfg(feature = "github")]
#[derive(Subcommand)]
enum SyncAction {
    /// Sync a single issue and its timeline
    Issue {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: i64,

        /// GitHub node id of the repository, used to create its category
        #[arg(short = 'i', long)]
        repo_id: Option<String>,
    },
    /// Sync every issue of a repository
    Repo {
        /// Repository as owner/name
        repo: String,

        /// GitHub node id of the repository, used to create its category
        #[arg(short = 'i', long)]
        repo_id: Option<String>,
    },
    /// Sync every mapped repository
    All,
}

#[cfg(feature = "github")]
#[derive(Subcommand)]
enum MirrorAction {
    /// Open a GitHub issue for a topic started on the forum
    Topic {
        /// Topic id
        topic_id: Uuid,
    },
    /// Post a forum reply as an issue comment
    Post {
        /// Post id
        post_id: Uuid,
    },
    /// Mirror every reply in a topic that isn't on GitHub yet
    Pending {
        /// Topic id
        topic_id: Uuid,
    },
    /// Close or reopen the issue to match the topic
    State {
        /// Topic id
        topic_id: Uuid,
    },
}

/// Make sure the directory of a file-backed SQLite database exists.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    #[cfg(feature = "github")]
    shutdown::setup_shutdown_handler();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("issuemirror=info,issuemirror_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(Term::stderr().is_term())
        .with_writer(std::io::stderr)
        .init();

    // Config file -> env vars -> defaults
    let config = config::Config::load();

    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set ISSUEMIRROR_DATABASE_URL")?;
    ensure_sqlite_dir(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Categories { action } => {
            commands::categories::handle_categories(action, &config, &database_url).await?;
        }
        #[cfg(feature = "github")]
        Commands::Sync { action } => {
            commands::sync::handle_sync(action, &config, &database_url).await?;
        }
        #[cfg(feature = "github")]
        Commands::Mirror { action } => {
            commands::mirror::handle_mirror(action, &config, &database_url).await?;
        }
    }

    Ok(())
}
