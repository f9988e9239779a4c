//! Message Ref Repository - the correlation map's persistence
//!
//! Maps (proposal, role) to the physical message on that surface. Entries
//! are write-once: `ON CONFLICT DO NOTHING` plus the affected-rows check
//! turns a duplicate write into an error instead of letting a slow retry
//! clobber a newer message's identity. Not authoritative for proposal
//! state — purely a rendering index.

use std::collections::HashMap;

use sqlx::{PgPool, Row};

use crate::error::{ModerationError, Result};
use crate::surface::{MessageRef, SurfaceRole};

pub struct MessageRefRepository {
    pool: PgPool,
}

impl MessageRefRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_refs (
                proposal_id BIGINT NOT NULL,
                role TEXT NOT NULL,
                chat_id BIGINT NOT NULL,
                message_id BIGINT NOT NULL,
                UNIQUE (proposal_id, role)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to create message_refs table: {e}")))?;
        Ok(())
    }

    pub async fn record(&self, proposal_id: i64, role: SurfaceRole, msg: MessageRef) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_refs (proposal_id, role, chat_id, message_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (proposal_id, role) DO NOTHING
            "#,
        )
        .bind(proposal_id)
        .bind(role.as_str())
        .bind(msg.chat_id)
        .bind(msg.message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to record message ref: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(ModerationError::RefAlreadyRecorded {
                proposal: proposal_id,
                role,
            });
        }
        Ok(())
    }

    pub async fn get_all(&self, proposal_id: i64) -> Result<HashMap<SurfaceRole, MessageRef>> {
        let rows =
            sqlx::query("SELECT role, chat_id, message_id FROM message_refs WHERE proposal_id = $1")
                .bind(proposal_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ModerationError::Store(format!("Failed to get message refs: {e}")))?;

        let mut refs = HashMap::new();
        for row in rows {
            let role_str: String = row.get("role");
            // Unknown roles from a newer schema revision are skipped.
            if let Some(role) = SurfaceRole::parse(&role_str) {
                refs.insert(role, MessageRef::new(row.get("chat_id"), row.get("message_id")));
            }
        }
        Ok(refs)
    }
}
