use console::Term;
use issuemirror::entity::post::{self, Entity as Post};
use issuemirror::entity::topic::Entity as Topic;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::MirrorAction;
use crate::commands::shared::{Syncer, build_syncer, report};
use crate::config;

async fn first_post(syncer: &Syncer, topic_id: Uuid) -> Result<post::Model, Box<dyn std::error::Error>> {
    Post::find()
        .filter(post::Column::TopicId.eq(topic_id))
        .filter(post::Column::PostNumber.eq(1))
        .one(syncer.db())
        .await?
        .ok_or_else(|| format!("Topic {topic_id} has no first post").into())
}

pub(crate) async fn handle_mirror(
    action: MirrorAction,
    config: &config::Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let syncer = build_syncer(config, database_url).await?;
    let is_tty = Term::stdout().is_term();

    match action {
        MirrorAction::Topic { topic_id } => {
            let post = first_post(&syncer, topic_id).await?;
            match syncer.mirror_issue_topic(&post).await? {
                Some(issue) => report(is_tty, &format!("Opened {}", issue.url)),
                None => report(is_tty, "Topic was not mirrored (already linked or not in a mapped category)"),
            }
        }
        MirrorAction::Post { post_id } => {
            let post = Post::find_by_id(post_id)
                .one(syncer.db())
                .await?
                .ok_or_else(|| format!("Post {post_id} not found"))?;
            match syncer.mirror_issue_post(&post).await? {
                Some(comment) => report(is_tty, &format!("Posted comment {}", comment.id)),
                None => report(is_tty, "Post was not mirrored"),
            }
        }
        MirrorAction::Pending { topic_id } => {
            let mut mirrored = 0usize;
            for post in syncer.unmirrored_posts(topic_id).await? {
                if syncer.mirror_issue_post(&post).await?.is_some() {
                    mirrored += 1;
                }
            }
            report(is_tty, &format!("Mirrored {mirrored} post(s)"));
        }
        MirrorAction::State { topic_id } => {
            let topic = Topic::find_by_id(topic_id)
                .one(syncer.db())
                .await?
                .ok_or_else(|| format!("Topic {topic_id} not found"))?;
            let state = if topic.closed { "closed" } else { "open" };
            if syncer.mirror_issue_state(&topic, topic.closed).await? {
                report(is_tty, &format!("Issue is now {state}"));
            } else {
                report(is_tty, &format!("Issue already {state}, or topic is not mirrored"));
            }
        }
    }

    Ok(())
}
