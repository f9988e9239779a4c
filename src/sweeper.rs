//! Ban sweeper background task.
//!
//! Every tick, expired bans are cleared and each affected user is told
//! exactly once. The clear itself is atomic and conditional: when an admin
//! unban races a tick, `clear_ban` returns false for the sweep and the
//! sweep notice is suppressed, so the two paths never double-notify.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::error::Result;
use crate::notices;
use crate::surface::{with_retry, OutboundContent};

/// Fixed sweep cadence.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct BanSweeper {
    ctx: Arc<AppContext>,
}

impl BanSweeper {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// One sweep pass. Returns the number of bans lifted.
    pub async fn tick(&self, now: i64) -> Result<usize> {
        let expired = self.ctx.ledger.find_expired_bans(now).await?;
        let mut lifted = 0;
        for ban in expired {
            // False means someone else already cleared it; no notice then.
            if !self.ctx.ledger.clear_ban(ban.user_id, now).await? {
                debug!(user_id = ban.user_id, "Ban already cleared, skipping notice");
                continue;
            }
            lifted += 1;
            info!(user_id = ban.user_id, "Ban expired and lifted");

            let notice = OutboundContent::Plain(notices::UNBANNED_NOTICE.to_string());
            if let Err(e) = with_retry("ban lifted notice", || {
                self.ctx.surface.send(ban.user_id, &notice, None)
            })
            .await
            {
                warn!(user_id = ban.user_id, error = %e, "Ban lifted notice undelivered");
            }
        }
        Ok(lifted)
    }

    /// Loop forever on the fixed interval. Tick failures are logged and the
    /// next tick proceeds.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        info!(interval_secs = SWEEP_INTERVAL.as_secs(), "Ban sweeper started");
        loop {
            interval.tick().await;
            let now = self.ctx.now();
            match self.tick(now).await {
                Ok(0) => {}
                Ok(lifted) => debug!(lifted, "Sweep pass complete"),
                Err(e) => warn!(error = %e, "Sweep pass failed"),
            }
        }
    }
}
