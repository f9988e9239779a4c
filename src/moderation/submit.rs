//! Submission flow: from an incoming user message to a pending proposal.
//!
//! Submissions are only accepted while the user is in submission mode and
//! not banned. The moderation destination must be configured before any
//! proposal row is created; a missing destination aborts with a
//! configuration error and no state changes.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::content::normalize::{render_markup, with_footer, StyleRun};
use crate::content::{apply_markup, EditOutcome};
use crate::context::AppContext;
use crate::error::Result;
use crate::notices;
use crate::surface::{with_retry, ControlCard, MessageRef, OutboundContent, SurfaceRole};

/// Body of an incoming submission as the transport adapter hands it over.
#[derive(Debug, Clone)]
pub enum SubmissionBody {
    /// Text message with its style runs (UTF-16 code-unit offsets).
    Text { text: String, runs: Vec<StyleRun> },
    /// Media message; the attachment travels by surface copy, never
    /// re-encoding. The caption and its style runs are normalized exactly
    /// like text and carried on the copy's caption.
    Media { caption: String, runs: Vec<StyleRun> },
}

/// One submission event from the submitter conversation.
#[derive(Debug, Clone)]
pub struct IncomingSubmission {
    pub submitter_id: i64,
    /// Display text for the moderation header mention.
    pub submitter_display: String,
    /// The original message, for replying and for media copies.
    pub origin: MessageRef,
    pub body: SubmissionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterOutcome {
    Ready,
    /// Refused; remaining ban time, already formatted.
    Banned { remaining: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { proposal_id: i64 },
    /// Refused and the submitter was told the remaining ban time.
    Banned { remaining: String },
    /// Not in submission mode; the event is dropped silently.
    Ignored,
}

pub struct SubmissionFlow {
    ctx: Arc<AppContext>,
}

impl SubmissionFlow {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Put the user into submission mode, unless banned.
    pub async fn enter(&self, user_id: i64) -> Result<EnterOutcome> {
        self.ctx.ledger.ensure_user(user_id).await?;
        if let Some(remaining) = self.ban_remaining(user_id).await? {
            return Ok(EnterOutcome::Banned { remaining });
        }
        self.ctx.ledger.set_submission_mode(user_id, true).await?;
        Ok(EnterOutcome::Ready)
    }

    pub async fn cancel(&self, user_id: i64) -> Result<()> {
        self.ctx.ledger.set_submission_mode(user_id, false).await
    }

    /// Turn one incoming message into a pending proposal on the moderation
    /// surface.
    pub async fn submit(&self, submission: IncomingSubmission) -> Result<SubmitOutcome> {
        self.ctx.ledger.ensure_user(submission.submitter_id).await?;

        if let Some(remaining) = self.ban_remaining(submission.submitter_id).await? {
            let notice = OutboundContent::Plain(notices::banned_notice(&remaining));
            if let Err(e) = with_retry("ban refusal notice", || {
                self.ctx.surface.reply(&submission.origin, &notice)
            })
            .await
            {
                warn!(user_id = submission.submitter_id, error = %e, "Ban refusal undelivered");
            }
            return Ok(SubmitOutcome::Banned { remaining });
        }

        let in_mode = self
            .ctx
            .ledger
            .get_user(submission.submitter_id)
            .await?
            .map(|u| u.in_submission_mode)
            .unwrap_or(false);
        if !in_mode {
            debug!(user_id = submission.submitter_id, "Message outside submission mode ignored");
            return Ok(SubmitOutcome::Ignored);
        }

        // Fail before any proposal row exists.
        let moderation_chat = self.ctx.moderation_chat()?;

        // An empty media caption still gets the footer alone.
        let (content_markup, is_media) = match &submission.body {
            SubmissionBody::Text { text, runs } => {
                (with_footer(&render_markup(text, runs)), false)
            }
            SubmissionBody::Media { caption, runs } => {
                (with_footer(&render_markup(caption, runs)), true)
            }
        };

        let now = self.ctx.now();
        let proposal_id = self
            .ctx
            .ledger
            .create_proposal(
                submission.submitter_id,
                submission.origin,
                now,
                Some(content_markup.clone()),
                is_media,
            )
            .await?;

        self.present_to_moderators(
            proposal_id,
            &submission,
            moderation_chat,
            now,
            &content_markup,
            is_media,
        )
        .await;

        self.acknowledge(proposal_id, &submission.origin).await;
        self.ctx
            .ledger
            .set_submission_mode(submission.submitter_id, false)
            .await?;

        info!(
            proposal_id,
            submitter_id = submission.submitter_id,
            "Submission queued for moderation"
        );
        Ok(SubmitOutcome::Submitted { proposal_id })
    }

    async fn ban_remaining(&self, user_id: i64) -> Result<Option<String>> {
        let now = self.ctx.now();
        let Some(user) = self.ctx.ledger.get_user(user_id).await? else {
            return Ok(None);
        };
        if !user.is_banned(now) {
            return Ok(None);
        }
        Ok(Some(if user.banned_until >= notices::PERMANENT_BAN {
            "permanent".to_string()
        } else {
            notices::format_remaining(now, user.banned_until)
        }))
    }

    /// Send the header line, the content, and the initial control keyboard
    /// to the moderation surface, recording each message's role. Delivery
    /// failures are logged; the proposal row already exists and moderators
    /// can still reach it.
    async fn present_to_moderators(
        &self,
        proposal_id: i64,
        submission: &IncomingSubmission,
        moderation_chat: i64,
        now: i64,
        content_markup: &str,
        is_media: bool,
    ) {
        let header = OutboundContent::Plain(header_line(&submission.submitter_display, now));
        let header_msg = match with_retry("moderation header", || {
            self.ctx.surface.send(moderation_chat, &header, None)
        })
        .await
        {
            Ok(msg) => {
                self.record_ref(proposal_id, SurfaceRole::ModeratorHeader, msg).await;
                Some(msg)
            }
            Err(e) => {
                warn!(proposal_id, error = %e, "Moderation header undelivered");
                None
            }
        };

        let card = ControlCard::Initial { proposal_id };
        if !is_media {
            // Text goes out as one message carrying both the markup and
            // the control keyboard.
            let content = OutboundContent::Markup(content_markup.to_string());
            match with_retry("moderation content", || {
                self.ctx.surface.send(moderation_chat, &content, Some(&card))
            })
            .await
            {
                Ok(msg) => {
                    self.record_ref(proposal_id, SurfaceRole::ModeratorContent, msg).await;
                    self.record_ref(proposal_id, SurfaceRole::ModeratorControl, msg).await;
                }
                Err(e) => {
                    warn!(proposal_id, error = %e, "Moderation content undelivered");
                    self.attach_to_header(proposal_id, header_msg, &card).await;
                }
            }
            return;
        }

        let copied = with_retry("moderation copy", || {
            self.ctx.surface.copy(moderation_chat, &submission.origin)
        })
        .await;
        match copied {
            Ok(msg) => {
                self.record_ref(proposal_id, SurfaceRole::ModeratorContent, msg).await;
                // The copy's caption becomes normalized caption + footer.
                let outcome =
                    apply_markup(self.ctx.surface.as_ref(), &msg, content_markup, Some(&card))
                        .await;
                if matches!(outcome, EditOutcome::Untouched { .. }) {
                    // The copy carries no keyboard; hang it off the header
                    // instead.
                    self.attach_to_header(proposal_id, header_msg, &card).await;
                } else {
                    self.record_ref(proposal_id, SurfaceRole::ModeratorControl, msg).await;
                }
            }
            Err(e) => {
                warn!(proposal_id, error = %e, "Moderation copy failed");
                self.attach_to_header(proposal_id, header_msg, &card).await;
            }
        }
    }

    async fn attach_to_header(
        &self,
        proposal_id: i64,
        header_msg: Option<MessageRef>,
        card: &ControlCard,
    ) {
        let Some(msg) = header_msg else {
            warn!(proposal_id, "No message available to carry the control keyboard");
            return;
        };
        match self.ctx.surface.edit_controls(&msg, card).await {
            Ok(()) => self.record_ref(proposal_id, SurfaceRole::ModeratorControl, msg).await,
            Err(e) => warn!(proposal_id, error = %e, "Control keyboard attachment failed"),
        }
    }

    async fn acknowledge(&self, proposal_id: i64, origin: &MessageRef) {
        let ack = OutboundContent::Plain(notices::CONFIRM_SENT.to_string());
        match with_retry("submission ack", || self.ctx.surface.reply(origin, &ack)).await {
            Ok(msg) => self.record_ref(proposal_id, SurfaceRole::SubmitterAck, msg).await,
            Err(e) => warn!(proposal_id, error = %e, "Submission ack undelivered"),
        }
    }

    async fn record_ref(&self, proposal_id: i64, role: SurfaceRole, msg: MessageRef) {
        if let Err(e) = self.ctx.ledger.record_message_ref(proposal_id, role, msg).await {
            debug!(proposal_id, role = %role, error = %e, "Message ref not recorded");
        }
    }
}

/// Moderation header line: "From <mention> • HH:MM • <date>".
fn header_line(display: &str, now: i64) -> String {
    let ts = Utc
        .timestamp_opt(now, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default());
    format!(
        "From {display} • {} • {}",
        ts.format("%H:%M"),
        ts.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_line_format() {
        // 2024-01-02 03:04:05 UTC
        let line = header_line("@alice", 1_704_164_645);
        assert_eq!(line, "From @alice • 03:04 • 2024-01-02");
    }
}
