//! Messaging surface boundary.
//!
//! The service talks to three message destinations (submitter conversation,
//! moderation group, publication channel) through the [`Surface`] trait. The
//! concrete transport adapter lives outside this crate; everything here is
//! the typed contract it must satisfy, plus the bounded-retry helper all
//! outbound calls go through.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ModerationError, Result};

/// Attempts per outbound call before giving up.
const RETRY_ATTEMPTS: u32 = 3;
/// Backoff between attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Identifies one physical message on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self { chat_id, message_id }
    }
}

/// Role a physical message plays for a proposal. Each role is recorded at
/// most once per proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceRole {
    SubmitterAck,
    ModeratorHeader,
    ModeratorContent,
    ModeratorControl,
    PublicationCopy,
}

impl SurfaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceRole::SubmitterAck => "submitter-ack",
            SurfaceRole::ModeratorHeader => "moderator-header",
            SurfaceRole::ModeratorContent => "moderator-content",
            SurfaceRole::ModeratorControl => "moderator-control",
            SurfaceRole::PublicationCopy => "publication-copy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitter-ack" => Some(SurfaceRole::SubmitterAck),
            "moderator-header" => Some(SurfaceRole::ModeratorHeader),
            "moderator-content" => Some(SurfaceRole::ModeratorContent),
            "moderator-control" => Some(SurfaceRole::ModeratorControl),
            "publication-copy" => Some(SurfaceRole::PublicationCopy),
            _ => None,
        }
    }
}

impl fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound message body. `Markup` carries the normalized HTML-style markup
/// and is sent with link previews disabled; `Plain` is sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Markup(String),
    Plain(String),
}

impl OutboundContent {
    pub fn text(&self) -> &str {
        match self {
            OutboundContent::Markup(s) | OutboundContent::Plain(s) => s,
        }
    }
}

/// The control keyboard attached to the moderator-facing card. Button
/// layout and localization are rendered by the transport adapter; the
/// state machine only picks which card is valid for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCard {
    /// Accept / Decline / Ban.
    Initial { proposal_id: i64 },
    /// Reward amount choice after Accept.
    RewardChoice { proposal_id: i64 },
    /// Penalty choice after Decline (0 or -1), with Back.
    PenaltyChoice { proposal_id: i64 },
    /// Ban duration choice, with Back.
    BanChoice { proposal_id: i64 },
    /// Terminal card: no further actions, one info affordance.
    Decided { proposal_id: i64, label: String },
}

/// Messaging surface collaborator. Implemented by the transport adapter.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Send a message, optionally with a control card attached.
    async fn send(
        &self,
        chat_id: i64,
        content: &OutboundContent,
        controls: Option<&ControlCard>,
    ) -> Result<MessageRef>;

    /// Send a message as a reply to an existing one.
    async fn reply(
        &self,
        reply_to: &MessageRef,
        content: &OutboundContent,
    ) -> Result<MessageRef>;

    /// Edit the caption of a media message. Fails for non-media messages
    /// and for captions the surface rejects; callers fall back.
    async fn edit_caption(
        &self,
        msg: &MessageRef,
        caption: &str,
        controls: Option<&ControlCard>,
    ) -> Result<()>;

    /// Edit the text of a text message.
    async fn edit_text(
        &self,
        msg: &MessageRef,
        text: &str,
        controls: Option<&ControlCard>,
    ) -> Result<()>;

    /// Swap only the control card, leaving content untouched.
    async fn edit_controls(&self, msg: &MessageRef, controls: &ControlCard) -> Result<()>;

    /// Copy a message to another destination, preserving media.
    async fn copy(&self, dest_chat_id: i64, source: &MessageRef) -> Result<MessageRef>;

    /// Read the reputation label displayed for a user in `chat_id`, if any.
    async fn reputation_label(&self, chat_id: i64, user_id: i64) -> Result<Option<String>>;

    /// Set or clear the displayed reputation label in `chat_id`.
    async fn set_reputation_label(
        &self,
        chat_id: i64,
        user_id: i64,
        label: Option<&str>,
    ) -> Result<()>;

    /// Users currently carrying a reputation label in `chat_id`.
    async fn labelled_users(&self, chat_id: i64) -> Result<Vec<i64>>;
}

/// Wall-clock collaborator, injectable for tests.
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now_unix(&self) -> i64;
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Run an outbound surface call with bounded retries and short backoff.
/// Transient failures are retried up to [`RETRY_ATTEMPTS`] times; the last
/// error is returned so callers can log and continue. Store state is never
/// affected by the outcome.
pub async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                warn!(what, attempt, error = %e, "Outbound call failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(match e {
                    ModerationError::TransientDelivery(msg) => ModerationError::TransientDelivery(
                        format!("{what} failed after {attempt} attempt(s): {msg}"),
                    ),
                    other => other,
                });
            }
        }
    }
}

/// Stand-in surface used when no transport adapter is wired (dry runs,
/// local smoke testing). Every send succeeds with a synthetic message id
/// and is logged at debug level; nothing is delivered anywhere.
pub struct DryRunSurface {
    next_id: std::sync::atomic::AtomicI64,
}

impl DryRunSurface {
    pub fn new() -> Self {
        Self {
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }

    fn next(&self, chat_id: i64) -> MessageRef {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        MessageRef::new(chat_id, id)
    }
}

impl Default for DryRunSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Surface for DryRunSurface {
    async fn send(
        &self,
        chat_id: i64,
        content: &OutboundContent,
        _controls: Option<&ControlCard>,
    ) -> Result<MessageRef> {
        let msg = self.next(chat_id);
        tracing::debug!(chat_id, message_id = msg.message_id, text = content.text(), "dry-run send");
        Ok(msg)
    }

    async fn reply(&self, reply_to: &MessageRef, content: &OutboundContent) -> Result<MessageRef> {
        let msg = self.next(reply_to.chat_id);
        tracing::debug!(chat_id = reply_to.chat_id, text = content.text(), "dry-run reply");
        Ok(msg)
    }

    async fn edit_caption(
        &self,
        _msg: &MessageRef,
        _caption: &str,
        _controls: Option<&ControlCard>,
    ) -> Result<()> {
        Ok(())
    }

    async fn edit_text(
        &self,
        _msg: &MessageRef,
        _text: &str,
        _controls: Option<&ControlCard>,
    ) -> Result<()> {
        Ok(())
    }

    async fn edit_controls(&self, _msg: &MessageRef, _controls: &ControlCard) -> Result<()> {
        Ok(())
    }

    async fn copy(&self, dest_chat_id: i64, _source: &MessageRef) -> Result<MessageRef> {
        Ok(self.next(dest_chat_id))
    }

    async fn reputation_label(&self, _chat_id: i64, _user_id: i64) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_reputation_label(
        &self,
        _chat_id: i64,
        _user_id: i64,
        _label: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    async fn labelled_users(&self, _chat_id: i64) -> Result<Vec<i64>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_role_round_trip() {
        for role in [
            SurfaceRole::SubmitterAck,
            SurfaceRole::ModeratorHeader,
            SurfaceRole::ModeratorContent,
            SurfaceRole::ModeratorControl,
            SurfaceRole::PublicationCopy,
        ] {
            assert_eq!(SurfaceRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(SurfaceRole::parse("banner"), None);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = with_retry("send", move || {
            let calls = calls2.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ModerationError::TransientDelivery("rate limited".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_and_reports() {
        let result: Result<()> = with_retry("edit", || async {
            Err(ModerationError::TransientDelivery("gone".into()))
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("3 attempt"));
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<()> = with_retry("send", move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ModerationError::NotFound("proposal"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
