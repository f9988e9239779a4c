//! User Repository - Postgres operations for the users table using sqlx

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::{ModerationError, Result};

/// Durable per-user state. Created lazily on first interaction, never
/// deleted. Reputation changes only through [`adjust_reputation`].
///
/// [`adjust_reputation`]: UserRepository::adjust_reputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub lang: String,
    pub lang_selected: bool,
    pub reputation: i32,
    /// Absolute unix timestamp; `0` means not banned.
    pub banned_until: i64,
    /// Gates whether the next content-bearing event from this user is
    /// interpreted as a new proposal.
    pub in_submission_mode: bool,
    pub accepted_count: i32,
    pub declined_count: i32,
}

impl UserRecord {
    pub fn is_banned(&self, now: i64) -> bool {
        self.banned_until > now
    }
}

/// A user whose ban window has elapsed, as returned by the expiry scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredBan {
    pub user_id: i64,
    pub lang: String,
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id BIGINT PRIMARY KEY,
                lang TEXT DEFAULT 'en',
                lang_selected BOOLEAN DEFAULT FALSE,
                reputation INTEGER DEFAULT 0,
                banned_until BIGINT DEFAULT 0,
                in_submission_mode BOOLEAN DEFAULT FALSE,
                accepted_count INTEGER DEFAULT 0,
                declined_count INTEGER DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to create users table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_users_banned \
             ON users(banned_until) WHERE banned_until > 0",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to create ban index: {e}")))?;

        Ok(())
    }

    pub async fn ensure(&self, user_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to ensure user: {e}")))?;
        Ok(())
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, lang, lang_selected, reputation, banned_until,
                   in_submission_mode, accepted_count, declined_count
            FROM users WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to get user: {e}")))?;

        Ok(row.map(|row| UserRecord {
            user_id: row.get("user_id"),
            lang: row.get("lang"),
            lang_selected: row.get("lang_selected"),
            reputation: row.get("reputation"),
            banned_until: row.get("banned_until"),
            in_submission_mode: row.get("in_submission_mode"),
            accepted_count: row.get("accepted_count"),
            declined_count: row.get("declined_count"),
        }))
    }

    pub async fn set_lang(&self, user_id: i64, lang: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, lang, lang_selected) VALUES ($1, $2, TRUE)
            ON CONFLICT (user_id) DO UPDATE SET lang = EXCLUDED.lang, lang_selected = TRUE
            "#,
        )
        .bind(user_id)
        .bind(lang)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to set lang: {e}")))?;
        Ok(())
    }

    pub async fn set_submission_mode(&self, user_id: i64, value: bool) -> Result<()> {
        sqlx::query("UPDATE users SET in_submission_mode = $1 WHERE user_id = $2")
            .bind(value)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to set submission mode: {e}")))?;
        Ok(())
    }

    /// Single atomic increment, applied in SQL. Callers never compute the
    /// new value themselves.
    pub async fn adjust_reputation(&self, user_id: i64, delta: i32) -> Result<()> {
        sqlx::query("UPDATE users SET reputation = reputation + $1 WHERE user_id = $2")
            .bind(delta)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to adjust reputation: {e}")))?;
        debug!(user_id, delta, "Reputation adjusted");
        Ok(())
    }

    pub async fn get_reputation(&self, user_id: i64) -> Result<i32> {
        let row = sqlx::query("SELECT reputation FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to get reputation: {e}")))?;
        Ok(row.map(|r| r.get("reputation")).unwrap_or(0))
    }

    pub async fn increment_accepted(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET accepted_count = accepted_count + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to increment accepted: {e}")))?;
        Ok(())
    }

    pub async fn increment_declined(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET declined_count = declined_count + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to increment declined: {e}")))?;
        Ok(())
    }

    pub async fn set_ban(&self, user_id: i64, until: i64) -> Result<()> {
        sqlx::query("UPDATE users SET banned_until = $1 WHERE user_id = $2")
            .bind(until)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Store(format!("Failed to set ban: {e}")))?;
        Ok(())
    }

    pub async fn find_expired_bans(&self, now: i64) -> Result<Vec<ExpiredBan>> {
        let rows = sqlx::query(
            "SELECT user_id, lang FROM users WHERE banned_until > 0 AND banned_until <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to find expired bans: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| ExpiredBan {
                user_id: row.get("user_id"),
                lang: row.get("lang"),
            })
            .collect())
    }

    /// Clears the ban only while it is still expired; the affected-rows
    /// count distinguishes the sweep winner from a racing admin unban.
    pub async fn clear_ban(&self, user_id: i64, now: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET banned_until = 0 \
             WHERE user_id = $1 AND banned_until > 0 AND banned_until <= $2",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Store(format!("Failed to clear ban: {e}")))?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_banned_boundary() {
        let mut user = UserRecord {
            user_id: 1,
            lang: "en".to_string(),
            lang_selected: false,
            reputation: 0,
            banned_until: 1_000,
            in_submission_mode: false,
            accepted_count: 0,
            declined_count: 0,
        };
        assert!(user.is_banned(999));
        // An exactly-elapsed ban no longer blocks.
        assert!(!user.is_banned(1_000));

        user.banned_until = 0;
        assert!(!user.is_banned(0));

        user.banned_until = (i32::MAX) as i64;
        assert!(user.is_banned(2_000_000_000));
    }
}
