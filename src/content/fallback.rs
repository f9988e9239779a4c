//! Ordered edit-fallback chain.
//!
//! Surfaces reject edits for many reasons (not a media message, caption too
//! complex, message deleted). The chain below is a hard contract: each step
//! is attempted only after the previous one fails, and every failure is a
//! typed, logged outcome rather than a swallowed error.

use tracing::{debug, warn};

use crate::content::normalize::{strip_markup, FOOTER};
use crate::surface::{ControlCard, MessageRef, OutboundContent, Surface};

/// How a markup application ultimately landed on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The caption edit carried the full markup.
    CaptionEdited,
    /// The text edit carried the full markup.
    TextEdited,
    /// Content edits failed; the markup was re-sent stripped to plain text.
    PlainTextEdited,
    /// All edits failed; the original message is untouched and the footer
    /// was (or was not) delivered as a separate trailing message.
    Untouched { footer_delivered: bool },
}

/// Apply combined markup to an existing message: edit-caption, then
/// edit-as-plain-text, then leave the original unedited and deliver the
/// footer separately.
pub async fn apply_markup(
    surface: &dyn Surface,
    msg: &MessageRef,
    markup: &str,
    controls: Option<&ControlCard>,
) -> EditOutcome {
    match surface.edit_caption(msg, markup, controls).await {
        Ok(()) => return EditOutcome::CaptionEdited,
        Err(e) => debug!(message_id = msg.message_id, error = %e, "Caption edit rejected"),
    }

    match surface.edit_text(msg, markup, controls).await {
        Ok(()) => return EditOutcome::TextEdited,
        Err(e) => debug!(message_id = msg.message_id, error = %e, "Text edit rejected"),
    }

    // Markup itself may be what the surface rejects; retry the text edit
    // with wrappers stripped before giving up on the edit entirely.
    let plain = strip_markup(markup);
    match surface.edit_text(msg, &plain, controls).await {
        Ok(()) => return EditOutcome::PlainTextEdited,
        Err(e) => debug!(message_id = msg.message_id, error = %e, "Plain-text edit rejected"),
    }

    let footer_delivered = match surface
        .send(msg.chat_id, &OutboundContent::Markup(FOOTER.to_string()), None)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!(chat_id = msg.chat_id, error = %e, "Trailing footer delivery failed");
            false
        }
    };
    EditOutcome::Untouched { footer_delivered }
}

/// Re-render the control card on an existing message, preserving content
/// where possible: caption edit, then text edit, then controls-only swap.
/// Returns false when every step failed; the store transition that
/// triggered the re-render stays committed regardless.
pub async fn replace_card(
    surface: &dyn Surface,
    msg: &MessageRef,
    content: &str,
    card: &ControlCard,
) -> bool {
    if surface.edit_caption(msg, content, Some(card)).await.is_ok() {
        return true;
    }
    if surface.edit_text(msg, content, Some(card)).await.is_ok() {
        return true;
    }
    match surface.edit_controls(msg, card).await {
        Ok(()) => true,
        Err(e) => {
            warn!(message_id = msg.message_id, error = %e, "Control card re-render failed");
            false
        }
    }
}
