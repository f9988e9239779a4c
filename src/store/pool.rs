//! Database Connection Pool using sqlx

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{ModerationError, Result};
use crate::store::proposals::{Decision, ProposalRecord, ProposalRepository, ProposalStatus};
use crate::store::refs::MessageRefRepository;
use crate::store::users::{ExpiredBan, UserRecord, UserRepository};
use crate::store::Ledger;
use crate::surface::{MessageRef, SurfaceRole};

/// Postgres-backed ledger: one repository per table over a shared pool.
pub struct LedgerPool {
    users: UserRepository,
    proposals: ProposalRepository,
    refs: MessageRefRepository,
}

impl LedgerPool {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to connect to Postgres: {e}")))?;

        info!("Connected to Postgres");

        let users = UserRepository::new(pool.clone());
        let proposals = ProposalRepository::new(pool.clone());
        let refs = MessageRefRepository::new(pool);

        Ok(Self {
            users,
            proposals,
            refs,
        })
    }

    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema...");
        self.users.init_schema().await?;
        self.proposals.init_schema().await?;
        self.refs.init_schema().await?;
        info!("Database schema initialized");
        Ok(())
    }
}

#[async_trait]
impl Ledger for LedgerPool {
    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        self.users.ensure(user_id).await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>> {
        self.users.get(user_id).await
    }

    async fn set_lang(&self, user_id: i64, lang: &str) -> Result<()> {
        self.users.set_lang(user_id, lang).await
    }

    async fn set_submission_mode(&self, user_id: i64, value: bool) -> Result<()> {
        self.users.set_submission_mode(user_id, value).await
    }

    async fn create_proposal(
        &self,
        submitter_id: i64,
        origin: MessageRef,
        created_at: i64,
        content_markup: Option<String>,
        is_media: bool,
    ) -> Result<i64> {
        self.proposals
            .create(submitter_id, origin, created_at, content_markup.as_deref(), is_media)
            .await
    }

    async fn get_proposal(&self, id: i64) -> Result<Option<ProposalRecord>> {
        self.proposals.get(id).await
    }

    async fn transition_proposal(
        &self,
        id: i64,
        from: ProposalStatus,
        to: ProposalStatus,
        decision: Option<Decision>,
    ) -> Result<bool> {
        self.proposals.transition(id, from, to, decision.as_ref()).await
    }

    async fn record_message_ref(
        &self,
        proposal_id: i64,
        role: SurfaceRole,
        msg: MessageRef,
    ) -> Result<()> {
        self.refs.record(proposal_id, role, msg).await
    }

    async fn get_message_refs(
        &self,
        proposal_id: i64,
    ) -> Result<HashMap<SurfaceRole, MessageRef>> {
        self.refs.get_all(proposal_id).await
    }

    async fn adjust_reputation(&self, user_id: i64, delta: i32) -> Result<()> {
        self.users.adjust_reputation(user_id, delta).await
    }

    async fn get_reputation(&self, user_id: i64) -> Result<i32> {
        self.users.get_reputation(user_id).await
    }

    async fn increment_accepted(&self, user_id: i64) -> Result<()> {
        self.users.increment_accepted(user_id).await
    }

    async fn increment_declined(&self, user_id: i64) -> Result<()> {
        self.users.increment_declined(user_id).await
    }

    async fn set_ban(&self, user_id: i64, until: i64) -> Result<()> {
        self.users.set_ban(user_id, until).await
    }

    async fn find_expired_bans(&self, now: i64) -> Result<Vec<ExpiredBan>> {
        self.users.find_expired_bans(now).await
    }

    async fn clear_ban(&self, user_id: i64, now: i64) -> Result<bool> {
        self.users.clear_ban(user_id, now).await
    }
}
