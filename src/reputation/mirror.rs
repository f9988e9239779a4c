//! Title mirror: keeps the externally displayed reputation label in step
//! with the ledger.
//!
//! The ledger is always correct; the label is eventually correct. `sync`
//! compares the displayed label against ledger truth and rewrites only on
//! mismatch, so re-applying it is idempotent. It runs after every
//! reputation change and from a periodic background loop that re-checks
//! every labelled user.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::error::{ModerationError, Result};
use crate::surface::with_retry;

/// Minimum reputation required to enable the public label.
pub const REPUTATION_FLOOR: i32 = 25;

/// Background re-check cadence.
const MIRROR_INTERVAL: Duration = Duration::from_secs(300);

/// Result of a display toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Enabled,
    Disabled,
    /// Enabling refused: reputation below [`REPUTATION_FLOOR`].
    BelowFloor,
}

pub struct TitleMirror {
    ctx: Arc<AppContext>,
}

impl TitleMirror {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Bring the displayed label for one user in line with ledger truth.
    /// A user with no label has the display off; sync never turns it on.
    /// A no-op when no title chat is configured.
    pub async fn sync(&self, user_id: i64) -> Result<()> {
        let Some(chat_id) = self.ctx.title_chat() else {
            return Ok(());
        };
        let Some(current) = self.ctx.surface.reputation_label(chat_id, user_id).await? else {
            return Ok(());
        };

        let reputation = self.ctx.ledger.get_reputation(user_id).await?;
        let desired = label_text(reputation);
        if current == desired {
            return Ok(());
        }

        with_retry("reputation label update", || {
            self.ctx
                .surface
                .set_reputation_label(chat_id, user_id, Some(&desired))
        })
        .await?;
        debug!(user_id, from = %current, to = %desired, "Reputation label updated");
        Ok(())
    }

    /// Turn the public label on or off. Enabling is refused below the
    /// reputation floor; disabling always succeeds.
    pub async fn toggle_display(&self, user_id: i64, on: bool) -> Result<ToggleOutcome> {
        let chat_id = self
            .ctx
            .title_chat()
            .ok_or_else(|| ModerationError::Configuration("title chat is not set".into()))?;

        if !on {
            with_retry("reputation label clear", || {
                self.ctx.surface.set_reputation_label(chat_id, user_id, None)
            })
            .await?;
            return Ok(ToggleOutcome::Disabled);
        }

        let reputation = self.ctx.ledger.get_reputation(user_id).await?;
        if reputation < REPUTATION_FLOOR {
            return Ok(ToggleOutcome::BelowFloor);
        }

        let label = label_text(reputation);
        with_retry("reputation label set", || {
            self.ctx
                .surface
                .set_reputation_label(chat_id, user_id, Some(&label))
        })
        .await?;
        Ok(ToggleOutcome::Enabled)
    }

    /// Periodic loop: re-sync every labelled user. Individual failures are
    /// logged and skipped; the loop never stops.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(MIRROR_INTERVAL);
        info!(interval_secs = MIRROR_INTERVAL.as_secs(), "Title mirror loop started");
        loop {
            interval.tick().await;
            let Some(chat_id) = self.ctx.title_chat() else {
                debug!("No title chat configured, skipping label sync pass");
                continue;
            };
            let users = match self.ctx.surface.labelled_users(chat_id).await {
                Ok(users) => users,
                Err(e) => {
                    warn!(error = %e, "Labelled-user listing failed");
                    continue;
                }
            };
            for user_id in users {
                if let Err(e) = self.sync(user_id).await {
                    warn!(user_id, error = %e, "Label sync failed");
                }
            }
        }
    }
}

fn label_text(reputation: i32) -> String {
    format!("{reputation} rep")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_text() {
        assert_eq!(label_text(0), "0 rep");
        assert_eq!(label_text(42), "42 rep");
        assert_eq!(label_text(-3), "-3 rep");
    }
}
