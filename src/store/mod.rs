//! Ledger Store
//!
//! Durable relational state for users and proposals, plus the correlation
//! map from proposals to the physical messages they spawned. The store is
//! the single source of truth; its conditional updates are the only
//! concurrency guard in the system. The store never performs side effects —
//! callers read the boolean results and act accordingly.

pub mod memory;
pub mod pool;
pub mod proposals;
pub mod refs;
pub mod users;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::surface::{MessageRef, SurfaceRole};

pub use memory::MemoryLedger;
pub use pool::LedgerPool;
pub use proposals::{Decision, ProposalRecord, ProposalStatus};
pub use users::{ExpiredBan, UserRecord};

/// The store contract consumed by the moderation state machine, submission
/// flow, sweeper and title mirror.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the user row if absent. Users are created lazily on first
    /// interaction and never deleted.
    async fn ensure_user(&self, user_id: i64) -> Result<()>;

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>>;

    async fn set_lang(&self, user_id: i64, lang: &str) -> Result<()>;

    async fn set_submission_mode(&self, user_id: i64, value: bool) -> Result<()>;

    /// Insert a proposal in `Pending` state; returns the store-assigned id.
    /// `content_markup` carries the normalized body (text) or caption
    /// (media) plus footer; `is_media` proposals publish by surface copy
    /// instead of a markup re-send.
    async fn create_proposal(
        &self,
        submitter_id: i64,
        origin: MessageRef,
        created_at: i64,
        content_markup: Option<String>,
        is_media: bool,
    ) -> Result<i64>;

    async fn get_proposal(&self, id: i64) -> Result<Option<ProposalRecord>>;

    /// Atomic compare-and-set on proposal status. Succeeds only if the
    /// current status equals `from`; otherwise returns `false` with no side
    /// effects. This is the sole race guard for moderator actions.
    async fn transition_proposal(
        &self,
        id: i64,
        from: ProposalStatus,
        to: ProposalStatus,
        decision: Option<Decision>,
    ) -> Result<bool>;

    /// Record the physical message spawned for a role. Write-once per
    /// (proposal, role): a second write errors instead of overwriting.
    async fn record_message_ref(
        &self,
        proposal_id: i64,
        role: SurfaceRole,
        msg: MessageRef,
    ) -> Result<()>;

    async fn get_message_refs(&self, proposal_id: i64)
        -> Result<HashMap<SurfaceRole, MessageRef>>;

    /// Single atomic increment; callers never read-modify-write reputation.
    async fn adjust_reputation(&self, user_id: i64, delta: i32) -> Result<()>;

    async fn get_reputation(&self, user_id: i64) -> Result<i32>;

    async fn increment_accepted(&self, user_id: i64) -> Result<()>;

    async fn increment_declined(&self, user_id: i64) -> Result<()>;

    /// Set `banned_until` unconditionally. `0` clears the ban (the admin
    /// unban path); this may race harmlessly with the sweeper.
    async fn set_ban(&self, user_id: i64, until: i64) -> Result<()>;

    /// Users whose ban has expired: `0 < banned_until <= now`.
    async fn find_expired_bans(&self, now: i64) -> Result<Vec<ExpiredBan>>;

    /// Clear a ban only if it is still expired at `now`. The boolean result
    /// guards the one-time "ban lifted" notification against races with an
    /// explicit admin unban.
    async fn clear_ban(&self, user_id: i64, now: i64) -> Result<bool>;
}
