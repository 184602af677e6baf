use issuemirror::db;
use issuemirror::state::repo_categories::{CategoryHooks, RepoCategories, list_mappings};

use crate::CategoriesAction;
use crate::config;

pub(crate) async fn handle_categories(
    action: CategoriesAction,
    config: &config::Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        CategoriesAction::List => {
            let mappings = list_mappings(&db).await?;
            if mappings.is_empty() {
                println!("No repositories are mapped.");
                return Ok(());
            }
            for (mapping, category) in mappings {
                let kind = if mapping.is_issues { "issues" } else { "commits" };
                println!(
                    "{:<40} {:<8} {:<24} {}",
                    mapping.repo_name,
                    kind,
                    mapping.repo_id.as_deref().unwrap_or("-"),
                    category.name
                );
            }
        }
        CategoriesAction::Ensure {
            repo,
            repo_id,
            commits,
        } => {
            let categories = RepoCategories::new(
                CategoryHooks::new(),
                config.mirror.default_parent_category.clone(),
            );
            match categories
                .ensure_category(&db, &repo, repo_id.as_deref(), !commits)
                .await?
            {
                Some(category) => println!("{repo} -> {} ({})", category.name, category.id),
                None => println!("{repo} is not mapped; pass --repo-id to create a category"),
            }
        }
    }

    Ok(())
}
