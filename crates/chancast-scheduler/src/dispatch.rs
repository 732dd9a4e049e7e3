//! Job dispatch — the single place a `JobKind` turns into work.

use std::sync::Arc;

use chancast_channels::broadcast_chat_id;
use chancast_core::Result;
use chancast_core::types::MediaKind;

use crate::context::AppContext;
use crate::expand;
use crate::job::{JobKind, PublishPost};
use crate::system;

/// Run one fired job. Errors are logged here; the scheduler loop never sees
/// them.
pub async fn run_job(ctx: Arc<AppContext>, job_id: &str, kind: JobKind) {
    let label = kind.label();
    let result = match kind {
        JobKind::ExpandPublish {
            schedule_id,
            user_id,
            args,
        } => expand::expand_publish(&ctx, schedule_id, user_id, &args).await,
        JobKind::PublishOnce { post } => publish_post(&ctx, &post).await,
        JobKind::SyncChannels => system::sync_channels(&ctx).await,
        JobKind::SyncOnlineStatus => system::sync_online_status(&ctx).await,
    };

    if let Err(e) = result {
        tracing::error!("job {job_id} ({label}) failed: {e}");
    }
}

/// Execute one expanded publish: compose text, gather media, send under the
/// session lock.
async fn publish_post(ctx: &Arc<AppContext>, post: &PublishPost) -> Result<()> {
    let mut text = ctx
        .composer
        .compose_post(
            &post.lang,
            post.min_word_count,
            post.max_word_count,
            &post.ai_prompt,
        )
        .await?;

    let mut media = Vec::new();
    if post.include_images
        && let Some(path) = ctx.db.random_media_path(post.user_id, MediaKind::Image)?
    {
        media.push(path);
    }
    if post.include_videos
        && let Some(path) = ctx.db.random_media_path(post.user_id, MediaKind::Video)?
    {
        media.push(path);
    }

    if post.include_primary_links && !post.primary_links.is_empty() {
        text.push_str(&format!("\nSubscribe: {}", post.primary_links.join(",")));
    }

    let chat_id = broadcast_chat_id(post.channel_tid);
    ctx.registry
        .with_session(&post.session_name, |client| {
            let text = text.clone();
            let media = media.clone();
            async move {
                if media.is_empty() {
                    client.send_message(chat_id, &text).await
                } else {
                    client.send_file(chat_id, &media, &text).await
                }
            }
        })
        .await?;

    tracing::info!(
        "📣 published to channel {} via {} ({} media)",
        post.channel_tid,
        post.session_name,
        media.len()
    );
    Ok(())
}
