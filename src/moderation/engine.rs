//! Moderation engine: guarded transitions and their side effects.
//!
//! Every moderator action runs through `apply_action`. Concurrency is
//! resolved entirely by the store's compare-and-set transition — any number
//! of concurrent callers may attempt one, exactly one wins, the rest get
//! [`ModerationError::StateConflict`]. Outbound sends and edits never roll
//! back a committed transition; the store is authoritative even when the
//! visible card is stale.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::content::normalize::FOOTER;
use crate::content::replace_card;
use crate::context::AppContext;
use crate::error::{ModerationError, Result};
use crate::moderation::action::{BanPeriod, ModeratorAction};
use crate::notices;
use crate::reputation::TitleMirror;
use crate::store::{Decision, ProposalRecord, ProposalStatus};
use crate::surface::{with_retry, ControlCard, MessageRef, OutboundContent, SurfaceRole};

/// Result of a successfully applied moderator action, for the transport
/// adapter to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    AwaitingReward,
    AwaitingPenalty,
    AwaitingBanDuration,
    ReturnedToPending,
    Published { reward: i32 },
    Declined { penalty: i32 },
    Banned { until: i64, label: String },
    Info(ProposalInfo),
}

/// Read-only decision summary for the info affordance on decided cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalInfo {
    pub submitter_id: i64,
    pub status: ProposalStatus,
    pub decision_actor: Option<i64>,
    pub decision_kind: Option<String>,
    pub decision_param: Option<String>,
    /// Remaining ban time for ban decisions ("permanent" for the sentinel).
    pub ban_remaining: Option<String>,
}

pub struct ModerationEngine {
    ctx: Arc<AppContext>,
}

impl ModerationEngine {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Interpret one moderator button press against current proposal state.
    pub async fn apply_action(
        &self,
        proposal_id: i64,
        moderator_id: i64,
        action: ModeratorAction,
    ) -> Result<ActionOutcome> {
        let proposal = self
            .ctx
            .ledger
            .get_proposal(proposal_id)
            .await?
            .ok_or(ModerationError::NotFound("proposal"))?;

        match action {
            ModeratorAction::Accept => {
                self.stage(
                    &proposal,
                    ProposalStatus::AcceptPendingReward,
                    ControlCard::RewardChoice { proposal_id },
                )
                .await?;
                Ok(ActionOutcome::AwaitingReward)
            }
            ModeratorAction::Decline => {
                self.stage(
                    &proposal,
                    ProposalStatus::DeclinePendingPenalty,
                    ControlCard::PenaltyChoice { proposal_id },
                )
                .await?;
                Ok(ActionOutcome::AwaitingPenalty)
            }
            ModeratorAction::Ban => {
                self.stage(
                    &proposal,
                    ProposalStatus::BanPendingDuration,
                    ControlCard::BanChoice { proposal_id },
                )
                .await?;
                Ok(ActionOutcome::AwaitingBanDuration)
            }
            ModeratorAction::Back => self.go_back(&proposal).await,
            ModeratorAction::Reward(amount) => {
                self.finalize_accept(&proposal, moderator_id, amount).await
            }
            ModeratorAction::Penalty(penalty) => {
                self.finalize_decline(&proposal, moderator_id, penalty).await
            }
            ModeratorAction::BanDuration(period) => {
                self.finalize_ban(&proposal, moderator_id, period).await
            }
            ModeratorAction::Info => Ok(ActionOutcome::Info(self.build_info(&proposal).await?)),
        }
    }

    /// Unconditional admin unban. Races harmlessly with the sweeper: both
    /// converge on "not banned", and the sweep's clear-guard keeps its own
    /// notification from firing once the ban is already gone.
    pub async fn admin_unban(&self, target_id: i64) -> Result<()> {
        self.ctx.ledger.ensure_user(target_id).await?;
        self.ctx.ledger.set_ban(target_id, 0).await?;
        info!(user_id = target_id, "Admin unban applied");

        let notice = OutboundContent::Plain(notices::ADMIN_UNBANNED_NOTICE.to_string());
        if let Err(e) = with_retry("admin unban notice", || {
            self.ctx.surface.send(target_id, &notice, None)
        })
        .await
        {
            warn!(user_id = target_id, error = %e, "Admin unban notice undelivered");
        }
        Ok(())
    }

    /// Move a `Pending` proposal into the matching choice state. Failure of
    /// the compare-and-set means another moderator already moved it.
    async fn stage(
        &self,
        proposal: &ProposalRecord,
        to: ProposalStatus,
        card: ControlCard,
    ) -> Result<()> {
        let won = self
            .ctx
            .ledger
            .transition_proposal(proposal.id, ProposalStatus::Pending, to, None)
            .await?;
        if !won {
            return Err(ModerationError::StateConflict);
        }
        self.rerender_card(proposal, card).await;
        Ok(())
    }

    async fn go_back(&self, proposal: &ProposalRecord) -> Result<ActionOutcome> {
        // Back is only legal from a choice state.
        if proposal.status.is_terminal() || proposal.status == ProposalStatus::Pending {
            return Err(ModerationError::StateConflict);
        }
        let won = self
            .ctx
            .ledger
            .transition_proposal(proposal.id, proposal.status, ProposalStatus::Pending, None)
            .await?;
        if !won {
            return Err(ModerationError::StateConflict);
        }
        self.rerender_card(proposal, ControlCard::Initial { proposal_id: proposal.id })
            .await;
        Ok(ActionOutcome::ReturnedToPending)
    }

    async fn finalize_accept(
        &self,
        proposal: &ProposalRecord,
        moderator_id: i64,
        amount: i32,
    ) -> Result<ActionOutcome> {
        // A missing publication channel aborts before any state changes.
        let channel = self.ctx.publication_channel()?;

        let decision = Decision::new(moderator_id, "accept", amount.to_string());
        let won = self
            .ctx
            .ledger
            .transition_proposal(
                proposal.id,
                ProposalStatus::AcceptPendingReward,
                ProposalStatus::Published,
                Some(decision),
            )
            .await?;
        if !won {
            return Err(ModerationError::StateConflict);
        }

        self.publish_copy(proposal, channel).await;

        // Guarded by the one-shot transition above: a retried handler
        // cannot double-apply the delta or the counter.
        self.ctx.ledger.adjust_reputation(proposal.submitter_id, amount).await?;
        self.ctx.ledger.increment_accepted(proposal.submitter_id).await?;

        self.notify_submitter(proposal, &notices::accept_notice(amount)).await;
        self.rerender_card(
            proposal,
            ControlCard::Decided {
                proposal_id: proposal.id,
                label: format!("Accepted +{amount}"),
            },
        )
        .await;
        self.mirror_reputation(proposal.submitter_id).await;

        info!(
            proposal_id = proposal.id,
            moderator_id,
            reward = amount,
            "Proposal published"
        );
        Ok(ActionOutcome::Published { reward: amount })
    }

    async fn finalize_decline(
        &self,
        proposal: &ProposalRecord,
        moderator_id: i64,
        penalty: i32,
    ) -> Result<ActionOutcome> {
        let param = if penalty > 0 { "-1" } else { "0" };
        let decision = Decision::new(moderator_id, "decline", param);
        let won = self
            .ctx
            .ledger
            .transition_proposal(
                proposal.id,
                ProposalStatus::DeclinePendingPenalty,
                ProposalStatus::Declined,
                Some(decision),
            )
            .await?;
        if !won {
            return Err(ModerationError::StateConflict);
        }

        let notice = if penalty > 0 {
            self.ctx.ledger.adjust_reputation(proposal.submitter_id, -1).await?;
            notices::decline_penalty_notice(1)
        } else {
            notices::DECLINE_NOTICE.to_string()
        };
        self.ctx.ledger.increment_declined(proposal.submitter_id).await?;

        self.notify_submitter(proposal, &notice).await;
        self.rerender_card(
            proposal,
            ControlCard::Decided {
                proposal_id: proposal.id,
                label: "Declined".to_string(),
            },
        )
        .await;
        self.mirror_reputation(proposal.submitter_id).await;

        info!(proposal_id = proposal.id, moderator_id, penalty, "Proposal declined");
        Ok(ActionOutcome::Declined { penalty })
    }

    async fn finalize_ban(
        &self,
        proposal: &ProposalRecord,
        moderator_id: i64,
        period: BanPeriod,
    ) -> Result<ActionOutcome> {
        let decision = Decision::new(moderator_id, "ban", period.label());
        let won = self
            .ctx
            .ledger
            .transition_proposal(
                proposal.id,
                ProposalStatus::BanPendingDuration,
                ProposalStatus::Banned,
                Some(decision),
            )
            .await?;
        if !won {
            return Err(ModerationError::StateConflict);
        }

        let now = self.ctx.now();
        let until = period.until(now);
        self.ctx.ledger.set_ban(proposal.submitter_id, until).await?;

        let notice = match period {
            BanPeriod::Forever => notices::PERMANENT_BANNED_NOTICE.to_string(),
            _ => notices::banned_notice(&notices::format_remaining(now, until)),
        };
        self.notify_submitter(proposal, &notice).await;
        self.rerender_card(
            proposal,
            ControlCard::Decided {
                proposal_id: proposal.id,
                label: format!("Banned {}", period.label()),
            },
        )
        .await;
        self.mirror_reputation(proposal.submitter_id).await;

        info!(
            proposal_id = proposal.id,
            moderator_id,
            until,
            period = period.label(),
            "Submitter banned"
        );
        Ok(ActionOutcome::Banned { until, label: period.label().to_string() })
    }

    async fn build_info(&self, proposal: &ProposalRecord) -> Result<ProposalInfo> {
        // Ban/reputation values may change concurrently; this is a
        // last-committed-value read, no snapshot required.
        let ban_remaining = match proposal.decision.as_ref().map(|d| d.kind.as_str()) {
            Some("ban") => {
                let user = self.ctx.ledger.get_user(proposal.submitter_id).await?;
                let until = user.map(|u| u.banned_until).unwrap_or(0);
                Some(if until >= notices::PERMANENT_BAN {
                    "permanent".to_string()
                } else {
                    notices::format_remaining(self.ctx.now(), until)
                })
            }
            _ => None,
        };

        Ok(ProposalInfo {
            submitter_id: proposal.submitter_id,
            status: proposal.status,
            decision_actor: proposal.decision.as_ref().map(|d| d.actor),
            decision_kind: proposal.decision.as_ref().map(|d| d.kind.clone()),
            decision_param: proposal.decision.as_ref().map(|d| d.param.clone()),
            ban_remaining,
        })
    }

    /// Copy the proposal content to the publication channel. Text posts
    /// are re-sent as markup (previews stay disabled); media is copied
    /// from the moderation chat, whose caption already carries the
    /// normalized markup. Failures are logged, never fatal.
    async fn publish_copy(&self, proposal: &ProposalRecord, channel: i64) {
        let refs = match self.ctx.ledger.get_message_refs(proposal.id).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!(proposal_id = proposal.id, error = %e, "Message refs unavailable");
                return;
            }
        };

        let published = if proposal.is_media {
            self.copy_to_channel(proposal, channel, &refs).await
        } else if let Some(markup) = &proposal.content_markup {
            let content = OutboundContent::Markup(markup.clone());
            match with_retry("publication send", || {
                self.ctx.surface.send(channel, &content, None)
            })
            .await
            {
                Ok(msg) => Some(msg),
                Err(e) => {
                    debug!(proposal_id = proposal.id, error = %e, "Publication send failed, copying");
                    self.copy_to_channel(proposal, channel, &refs).await
                }
            }
        } else {
            self.copy_to_channel(proposal, channel, &refs).await
        };

        if let Some(msg) = published {
            if let Err(e) = self
                .ctx
                .ledger
                .record_message_ref(proposal.id, SurfaceRole::PublicationCopy, msg)
                .await
            {
                // A retried handler may have recorded it already.
                debug!(proposal_id = proposal.id, error = %e, "Publication ref not recorded");
            }
        }
    }

    async fn copy_to_channel(
        &self,
        proposal: &ProposalRecord,
        channel: i64,
        refs: &HashMap<SurfaceRole, MessageRef>,
    ) -> Option<MessageRef> {
        let source = refs.get(&SurfaceRole::ModeratorContent)?;
        match with_retry("publication copy", || self.ctx.surface.copy(channel, source)).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(proposal_id = proposal.id, error = %e, "Publication copy failed");
                None
            }
        }
    }

    /// Reply to the original submission; fall back to a plain send into
    /// the submitter conversation when the reply target is gone.
    async fn notify_submitter(&self, proposal: &ProposalRecord, text: &str) {
        let content = OutboundContent::Plain(text.to_string());
        let replied = with_retry("submitter notice", || {
            self.ctx.surface.reply(&proposal.origin, &content)
        })
        .await;
        if let Err(e) = replied {
            debug!(proposal_id = proposal.id, error = %e, "Reply failed, sending plain");
            if let Err(e) = self.ctx.surface.send(proposal.origin.chat_id, &content, None).await {
                warn!(proposal_id = proposal.id, error = %e, "Submitter notice undelivered");
            }
        }
    }

    /// Re-render the control card through the correlation map. A failed
    /// edit leaves a stale card; the store transition stands regardless.
    async fn rerender_card(&self, proposal: &ProposalRecord, card: ControlCard) {
        let refs = match self.ctx.ledger.get_message_refs(proposal.id).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!(proposal_id = proposal.id, error = %e, "Message refs unavailable");
                return;
            }
        };
        let Some(control) = refs.get(&SurfaceRole::ModeratorControl) else {
            warn!(proposal_id = proposal.id, "No control card ref recorded");
            return;
        };

        let content = proposal
            .content_markup
            .clone()
            .unwrap_or_else(|| FOOTER.to_string());
        if !replace_card(self.ctx.surface.as_ref(), control, &content, &card).await {
            warn!(proposal_id = proposal.id, "Control card left stale after failed edits");
        }
    }

    async fn mirror_reputation(&self, user_id: i64) {
        if let Err(e) = TitleMirror::new(self.ctx.clone()).sync(user_id).await {
            warn!(user_id, error = %e, "Reputation title mirror failed");
        }
    }
}
