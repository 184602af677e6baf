use std::sync::Arc;

use issuemirror::IssueSyncer;
use issuemirror::db;
use issuemirror::github::{GitHubService, issue_service};

use crate::config;

pub(crate) type Syncer = IssueSyncer<GitHubService>;

/// Connect to the database and GitHub and build a syncer from the config.
pub(crate) async fn build_syncer(
    config: &config::Config,
    database_url: &str,
) -> Result<Syncer, Box<dyn std::error::Error>> {
    let token = config.github_token().ok_or(
        "No GitHub token configured. Set ISSUEMIRROR_GITHUB_TOKEN or add `token` under [github] in the config file.",
    )?;

    let db = Arc::new(db::connect(database_url).await?);
    let service = issue_service(&token)?;
    Ok(IssueSyncer::new(db, service, config.mirror_settings()))
}

/// Print a line for humans, or log it when output isn't a terminal.
pub(crate) fn report(is_tty: bool, message: &str) {
    if is_tty {
        println!("{message}");
    } else {
        tracing::info!("{}", message);
    }
}
