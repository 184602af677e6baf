//! Configuration file support for issuemirror.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `ISSUEMIRROR_`, e.g., `ISSUEMIRROR_DATABASE_URL`)
//! 3. Config file (~/.config/issuemirror/config.toml or ./issuemirror.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/issuemirror/issuemirror.db`
//! on Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/issuemirror/issuemirror.db"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."  # or use ISSUEMIRROR_GITHUB_TOKEN env var
//!
//! [mirror]
//! issue_tag = "github-issue"
//! default_parent_category = "GitHub"
//! forum_base_url = "https://forum.example.com"
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use issuemirror::MirrorSettings;
use issuemirror::syncer::DEFAULT_ISSUE_TAG;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// How mirrored content is laid out on the forum.
    pub mirror: MirrorConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/issuemirror/issuemirror.db` if not specified.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via ISSUEMIRROR_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
}

/// Mirror options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Tag applied to topics that mirror an issue.
    pub issue_tag: String,
    /// Name of the category new repository categories are nested under.
    pub default_parent_category: Option<String>,
    /// Forum base URL used in links back from GitHub.
    pub forum_base_url: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        let settings = MirrorSettings::default();
        Self {
            issue_tag: settings.issue_tag,
            default_parent_category: settings.default_parent_category,
            forum_base_url: settings.forum_base_url,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/issuemirror/config.toml)
    /// 3. Local config file (./issuemirror.toml)
    /// 4. Environment variables with ISSUEMIRROR_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "issuemirror") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Local config file has higher priority than XDG
        let local_config = PathBuf::from("issuemirror.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./issuemirror.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., ISSUEMIRROR_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("ISSUEMIRROR")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the file
    /// if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("issuemirror.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Get the GitHub token.
    #[cfg(feature = "github")]
    pub fn github_token(&self) -> Option<String> {
        self.github.token.clone().filter(|t| !t.trim().is_empty())
    }

    /// Settings handed to the syncer.
    pub fn mirror_settings(&self) -> MirrorSettings {
        let issue_tag = if self.mirror.issue_tag.trim().is_empty() {
            DEFAULT_ISSUE_TAG.to_string()
        } else {
            self.mirror.issue_tag.clone()
        };
        MirrorSettings {
            issue_tag,
            default_parent_category: self.mirror.default_parent_category.clone(),
            forum_base_url: self.mirror.forum_base_url.clone(),
        }
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/issuemirror` or `~/.local/state/issuemirror`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "issuemirror").map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
