//! Proposal Repository - Postgres operations for the proposals table
//!
//! Proposals are an append-only audit trail: rows are never deleted, and
//! status changes go exclusively through the compare-and-set transition.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::{ModerationError, Result};
use crate::surface::MessageRef;

/// Moderation state of a proposal. Transitions follow the state machine
/// edges only; `Published`, `Declined` and `Banned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Pending,
    AcceptPendingReward,
    DeclinePendingPenalty,
    BanPendingDuration,
    Published,
    Declined,
    Banned,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::AcceptPendingReward => "accept_pending_reward",
            ProposalStatus::DeclinePendingPenalty => "decline_pending_penalty",
            ProposalStatus::BanPendingDuration => "ban_pending_duration",
            ProposalStatus::Published => "published",
            ProposalStatus::Declined => "declined",
            ProposalStatus::Banned => "banned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProposalStatus::Pending),
            "accept_pending_reward" => Some(ProposalStatus::AcceptPendingReward),
            "decline_pending_penalty" => Some(ProposalStatus::DeclinePendingPenalty),
            "ban_pending_duration" => Some(ProposalStatus::BanPendingDuration),
            "published" => Some(ProposalStatus::Published),
            "declined" => Some(ProposalStatus::Declined),
            "banned" => Some(ProposalStatus::Banned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Published | ProposalStatus::Declined | ProposalStatus::Banned
        )
    }
}

/// Moderation decision metadata recorded when a proposal reaches a terminal
/// state, for later audit and info lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub actor: i64,
    /// "accept", "decline" or "ban".
    pub kind: String,
    /// Awarded amount, penalty, or ban duration label.
    pub param: String,
}

impl Decision {
    pub fn new(actor: i64, kind: &str, param: impl Into<String>) -> Self {
        Self {
            actor,
            kind: kind.to_string(),
            param: param.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub id: i64,
    pub submitter_id: i64,
    /// Original content message in the submitter conversation, for replying.
    pub origin: MessageRef,
    pub created_at: i64,
    pub status: ProposalStatus,
    /// Normalized markup (body or caption plus footer).
    pub content_markup: Option<String>,
    /// Media proposals publish by surface copy; the markup above rides on
    /// the copy's caption instead of being re-sent as text.
    pub is_media: bool,
    pub decision: Option<Decision>,
}

pub struct ProposalRepository {
    pool: PgPool,
}

impl ProposalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proposals (
                id BIGSERIAL PRIMARY KEY,
                submitter_id BIGINT NOT NULL,
                origin_chat_id BIGINT NOT NULL,
                origin_msg_id BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                content_markup TEXT,
                is_media BOOLEAN NOT NULL DEFAULT FALSE,
                decision_actor BIGINT,
                decision_kind TEXT,
                decision_param TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to create proposals table: {e}")))?;
        Ok(())
    }

    pub async fn create(
        &self,
        submitter_id: i64,
        origin: MessageRef,
        created_at: i64,
        content_markup: Option<&str>,
        is_media: bool,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO proposals (submitter_id, origin_chat_id, origin_msg_id, created_at, content_markup, is_media)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(submitter_id)
        .bind(origin.chat_id)
        .bind(origin.message_id)
        .bind(created_at)
        .bind(content_markup)
        .bind(is_media)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to create proposal: {e}")))?;

        let id: i64 = row.get("id");
        debug!(proposal_id = id, submitter_id, "Proposal created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<ProposalRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, submitter_id, origin_chat_id, origin_msg_id, created_at,
                   status, content_markup, is_media,
                   decision_actor, decision_kind, decision_param
            FROM proposals WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to get proposal: {e}")))?;

        let Some(row) = row else { return Ok(None) };

        let status_str: String = row.get("status");
        let status = ProposalStatus::parse(&status_str).ok_or_else(|| {
            ModerationError::Store(format!("Unknown proposal status: {status_str}"))
        })?;

        let decision = match (
            row.get::<Option<i64>, _>("decision_actor"),
            row.get::<Option<String>, _>("decision_kind"),
            row.get::<Option<String>, _>("decision_param"),
        ) {
            (Some(actor), Some(kind), param) => Some(Decision {
                actor,
                kind,
                param: param.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Some(ProposalRecord {
            id: row.get("id"),
            submitter_id: row.get("submitter_id"),
            origin: MessageRef::new(row.get("origin_chat_id"), row.get("origin_msg_id")),
            created_at: row.get("created_at"),
            status,
            content_markup: row.get("content_markup"),
            is_media: row.get("is_media"),
            decision,
        }))
    }

    /// Compare-and-set transition. The WHERE clause on the current status
    /// makes concurrent moderators race on the row update; exactly one
    /// caller observes `rows_affected == 1`.
    pub async fn transition(
        &self,
        id: i64,
        from: ProposalStatus,
        to: ProposalStatus,
        decision: Option<&Decision>,
    ) -> Result<bool> {
        let result = match decision {
            Some(d) => sqlx::query(
                r#"
                UPDATE proposals
                SET status = $1, decision_actor = $2, decision_kind = $3, decision_param = $4
                WHERE id = $5 AND status = $6
                "#,
            )
            .bind(to.as_str())
            .bind(d.actor)
            .bind(&d.kind)
            .bind(&d.param)
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await,
            None => sqlx::query("UPDATE proposals SET status = $1 WHERE id = $2 AND status = $3")
                .bind(to.as_str())
                .bind(id)
                .bind(from.as_str())
                .execute(&self.pool)
                .await,
        }
        .map_err(|e| ModerationError::Store(format!("Failed to transition proposal: {e}")))?;

        let won = result.rows_affected() == 1;
        debug!(
            proposal_id = id,
            from = from.as_str(),
            to = to.as_str(),
            won,
            "Proposal transition attempted"
        );
        Ok(won)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProposalStatus::Pending,
            ProposalStatus::AcceptPendingReward,
            ProposalStatus::DeclinePendingPenalty,
            ProposalStatus::BanPendingDuration,
            ProposalStatus::Published,
            ProposalStatus::Declined,
            ProposalStatus::Banned,
        ] {
            assert_eq!(ProposalStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProposalStatus::parse("archived"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ProposalStatus::Published.is_terminal());
        assert!(ProposalStatus::Declined.is_terminal());
        assert!(ProposalStatus::Banned.is_terminal());
        assert!(!ProposalStatus::Pending.is_terminal());
        assert!(!ProposalStatus::AcceptPendingReward.is_terminal());
    }
}
