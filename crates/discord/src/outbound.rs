//! Outbound delivery: chunked text and media attachments.

use {
    serenity::all::{ChannelId, CreateAttachment, CreateMessage, MessageId},
    tracing::warn,
};

use {
    parrot_agents::{AbortReason, FinalResult},
    parrot_common::{chunk_text, types::MediaAttachment},
};

use crate::Result;

/// Discord enforces a 2 000-character limit per message.
const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

/// Send text to a channel, chunking at the message-length limit. When
/// `reference` is set, the first chunk is sent as a Discord reply.
pub async fn send_text(
    http: &serenity::http::Http,
    channel_id: ChannelId,
    reference: Option<MessageId>,
    text: &str,
) -> Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    for (i, chunk) in chunk_text(text, DISCORD_MAX_MESSAGE_LEN).iter().enumerate() {
        let mut create = CreateMessage::new().content(chunk);
        // Only the first chunk gets the reply reference.
        if i == 0
            && let Some(ref_id) = reference
        {
            create = create.reference_message((channel_id, ref_id));
        }
        channel_id.send_message(http, create).await?;
    }
    Ok(())
}

/// Upload generated media as message attachments, one message per batch.
pub async fn send_attachments(
    http: &serenity::http::Http,
    channel_id: ChannelId,
    attachments: &[MediaAttachment],
) -> Result<()> {
    if attachments.is_empty() {
        return Ok(());
    }
    let mut create = CreateMessage::new();
    for attachment in attachments {
        create = create.add_file(CreateAttachment::bytes(
            attachment.bytes.clone(),
            attachment.filename.clone(),
        ));
    }
    channel_id.send_message(http, create).await?;
    Ok(())
}

/// Map a loop outcome to the text shown to the user.
#[must_use]
pub fn render_result(result: &FinalResult) -> String {
    match result {
        FinalResult::Answer { text, attachments } => match text {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ if !attachments.is_empty() => String::new(),
            _ => "I don't have a response for that.".into(),
        },
        FinalResult::Aborted(AbortReason::Cancelled) => "Stopped.".into(),
        FinalResult::Aborted(AbortReason::IterationLimit) => {
            "I couldn't finish within the allowed number of steps.".into()
        },
        FinalResult::Failed(e) => {
            warn!(error = %e, "run failed");
            format!("Something went wrong: {e}")
        },
    }
}
