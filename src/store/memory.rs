//! In-memory ledger
//!
//! Used when Postgres is disabled in configuration and by the test suite.
//! A single mutex over the whole state gives the same atomicity the SQL
//! conditional updates provide: a compare-and-set observes and mutates the
//! status under one lock acquisition.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{ModerationError, Result};
use crate::store::proposals::{Decision, ProposalRecord, ProposalStatus};
use crate::store::users::{ExpiredBan, UserRecord};
use crate::store::Ledger;
use crate::surface::{MessageRef, SurfaceRole};

#[derive(Default)]
struct MemoryState {
    users: HashMap<i64, UserRecord>,
    proposals: HashMap<i64, ProposalRecord>,
    refs: HashMap<(i64, SurfaceRole), MessageRef>,
    next_proposal_id: i64,
}

pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_proposal_id: 1,
                ..MemoryState::default()
            }),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn blank_user(user_id: i64) -> UserRecord {
    UserRecord {
        user_id,
        lang: "en".to_string(),
        lang_selected: false,
        reputation: 0,
        banned_until: 0,
        in_submission_mode: false,
        accepted_count: 0,
        declined_count: 0,
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.users.entry(user_id).or_insert_with(|| blank_user(user_id));
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn set_lang(&self, user_id: i64, lang: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state.users.entry(user_id).or_insert_with(|| blank_user(user_id));
        user.lang = lang.to_string();
        user.lang_selected = true;
        Ok(())
    }

    async fn set_submission_mode(&self, user_id: i64, value: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.in_submission_mode = value;
        }
        Ok(())
    }

    async fn create_proposal(
        &self,
        submitter_id: i64,
        origin: MessageRef,
        created_at: i64,
        content_markup: Option<String>,
        is_media: bool,
    ) -> Result<i64> {
        let mut state = self.state.lock().await;
        let id = state.next_proposal_id;
        state.next_proposal_id += 1;
        state.proposals.insert(
            id,
            ProposalRecord {
                id,
                submitter_id,
                origin,
                created_at,
                status: ProposalStatus::Pending,
                content_markup,
                is_media,
                decision: None,
            },
        );
        Ok(id)
    }

    async fn get_proposal(&self, id: i64) -> Result<Option<ProposalRecord>> {
        let state = self.state.lock().await;
        Ok(state.proposals.get(&id).cloned())
    }

    async fn transition_proposal(
        &self,
        id: i64,
        from: ProposalStatus,
        to: ProposalStatus,
        decision: Option<Decision>,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.proposals.get_mut(&id) {
            Some(p) if p.status == from => {
                p.status = to;
                if decision.is_some() {
                    p.decision = decision;
                }
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn record_message_ref(
        &self,
        proposal_id: i64,
        role: SurfaceRole,
        msg: MessageRef,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let key = (proposal_id, role);
        if state.refs.contains_key(&key) {
            return Err(ModerationError::RefAlreadyRecorded {
                proposal: proposal_id,
                role,
            });
        }
        state.refs.insert(key, msg);
        Ok(())
    }

    async fn get_message_refs(
        &self,
        proposal_id: i64,
    ) -> Result<HashMap<SurfaceRole, MessageRef>> {
        let state = self.state.lock().await;
        Ok(state
            .refs
            .iter()
            .filter(|((id, _), _)| *id == proposal_id)
            .map(|((_, role), msg)| (*role, *msg))
            .collect())
    }

    async fn adjust_reputation(&self, user_id: i64, delta: i32) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state.users.entry(user_id).or_insert_with(|| blank_user(user_id));
        user.reputation += delta;
        Ok(())
    }

    async fn get_reputation(&self, user_id: i64) -> Result<i32> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|u| u.reputation).unwrap_or(0))
    }

    async fn increment_accepted(&self, user_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state.users.entry(user_id).or_insert_with(|| blank_user(user_id));
        user.accepted_count += 1;
        Ok(())
    }

    async fn increment_declined(&self, user_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state.users.entry(user_id).or_insert_with(|| blank_user(user_id));
        user.declined_count += 1;
        Ok(())
    }

    async fn set_ban(&self, user_id: i64, until: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state.users.entry(user_id).or_insert_with(|| blank_user(user_id));
        user.banned_until = until;
        Ok(())
    }

    async fn find_expired_bans(&self, now: i64) -> Result<Vec<ExpiredBan>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.banned_until > 0 && u.banned_until <= now)
            .map(|u| ExpiredBan {
                user_id: u.user_id,
                lang: u.lang.clone(),
            })
            .collect())
    }

    async fn clear_ban(&self, user_id: i64, now: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&user_id) {
            Some(u) if u.banned_until > 0 && u.banned_until <= now => {
                u.banned_until = 0;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transition_cas_single_winner() {
        let ledger = MemoryLedger::new();
        let id = ledger
            .create_proposal(1, MessageRef::new(10, 100), 0, None, false)
            .await
            .unwrap();

        let first = ledger
            .transition_proposal(
                id,
                ProposalStatus::Pending,
                ProposalStatus::AcceptPendingReward,
                None,
            )
            .await
            .unwrap();
        let second = ledger
            .transition_proposal(
                id,
                ProposalStatus::Pending,
                ProposalStatus::DeclinePendingPenalty,
                None,
            )
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let prop = ledger.get_proposal(id).await.unwrap().unwrap();
        assert_eq!(prop.status, ProposalStatus::AcceptPendingReward);
    }

    #[tokio::test]
    async fn test_message_refs_write_once() {
        let ledger = MemoryLedger::new();
        let id = ledger
            .create_proposal(1, MessageRef::new(10, 100), 0, None, false)
            .await
            .unwrap();

        ledger
            .record_message_ref(id, SurfaceRole::ModeratorControl, MessageRef::new(20, 5))
            .await
            .unwrap();
        let err = ledger
            .record_message_ref(id, SurfaceRole::ModeratorControl, MessageRef::new(20, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::RefAlreadyRecorded { .. }));

        // The first write survives.
        let refs = ledger.get_message_refs(id).await.unwrap();
        assert_eq!(refs[&SurfaceRole::ModeratorControl], MessageRef::new(20, 5));
    }

    #[tokio::test]
    async fn test_set_lang_marks_selection() {
        let ledger = MemoryLedger::new();
        ledger.ensure_user(7).await.unwrap();
        let user = ledger.get_user(7).await.unwrap().unwrap();
        assert_eq!(user.lang, "en");
        assert!(!user.lang_selected);

        ledger.set_lang(7, "ru").await.unwrap();
        let user = ledger.get_user(7).await.unwrap().unwrap();
        assert_eq!(user.lang, "ru");
        assert!(user.lang_selected);
    }

    #[tokio::test]
    async fn test_clear_ban_only_when_expired() {
        let ledger = MemoryLedger::new();
        ledger.ensure_user(7).await.unwrap();
        ledger.set_ban(7, 1_000).await.unwrap();

        assert!(!ledger.clear_ban(7, 999).await.unwrap());
        assert!(ledger.clear_ban(7, 1_000).await.unwrap());
        // Second clear for the same expiry finds nothing.
        assert!(!ledger.clear_ban(7, 1_001).await.unwrap());
    }
}
