use console::Term;
use issuemirror::MirrorError;
use issuemirror::state::repo_categories::repo_names;
use issuemirror::syncer::{IssueSyncReport, RepoSyncReport};

use crate::SyncAction;
use crate::commands::shared::{build_syncer, report};
use crate::config;
use crate::shutdown::is_shutdown_requested;

fn describe_issue(r: &IssueSyncReport) -> String {
    let topic = if r.topic_created { "created" } else { "found" };
    format!(
        "{}: topic {} ({}), {} new post(s), {} already mirrored, {} unchanged",
        r.issue, r.topic_id, topic, r.posts_created, r.posts_existing, r.unchanged
    )
}

fn describe_repo(repo: &str, r: &RepoSyncReport) -> String {
    format!(
        "{repo}: {} issue(s), {} new topic(s), {} new post(s)",
        r.issues, r.topics_created, r.posts_created
    )
}

/// Rate limiting ends a multi-repository run; other failures skip the repo.
fn is_fatal(e: &MirrorError) -> bool {
    matches!(e, MirrorError::Source(source) if source.is_rate_limited())
        || matches!(e, MirrorError::Database(_))
}

pub(crate) async fn handle_sync(
    action: SyncAction,
    config: &config::Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let syncer = build_syncer(config, database_url).await?;
    let is_tty = Term::stdout().is_term();

    match action {
        SyncAction::Issue {
            repo,
            number,
            repo_id,
        } => {
            let r = syncer.sync_issue(&repo, number, repo_id.as_deref()).await?;
            report(is_tty, &describe_issue(&r));
        }
        SyncAction::Repo { repo, repo_id } => {
            let r = syncer.sync_repo(&repo, repo_id.as_deref()).await?;
            report(is_tty, &describe_repo(&repo, &r));
        }
        SyncAction::All => {
            let repos = repo_names(syncer.db()).await?;
            if repos.is_empty() {
                report(
                    is_tty,
                    "No repositories are mapped yet. Sync one with `issuemirror sync repo`.",
                );
                return Ok(());
            }

            let mut failed = 0usize;
            for repo in &repos {
                if is_shutdown_requested() {
                    tracing::warn!("Stopping before {}", repo);
                    break;
                }
                match syncer.sync_repo(repo, None).await {
                    Ok(r) => report(is_tty, &describe_repo(repo, &r)),
                    Err(e) if is_fatal(&e) => return Err(e.into()),
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(repo = %repo, error = %e, "Failed to sync repository");
                    }
                }
            }

            if failed > 0 {
                return Err(format!("{failed} of {} repositories failed to sync", repos.len()).into());
            }
        }
    }

    Ok(())
}
