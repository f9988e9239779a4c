//! Application context passed into every component.
//!
//! There are no process-wide singletons: the store handle, the messaging
//! surface, the clock and the configured destinations travel together in
//! one explicit context object.

use std::sync::Arc;

use crate::config::SurfaceTargets;
use crate::error::{ModerationError, Result};
use crate::store::Ledger;
use crate::surface::{Clock, Surface};

pub struct AppContext {
    pub ledger: Arc<dyn Ledger>,
    pub surface: Arc<dyn Surface>,
    pub clock: Arc<dyn Clock>,
    pub targets: SurfaceTargets,
}

impl AppContext {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        surface: Arc<dyn Surface>,
        clock: Arc<dyn Clock>,
        targets: SurfaceTargets,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            surface,
            clock,
            targets,
        })
    }

    /// Moderation group destination; required before a submission may
    /// create any proposal state.
    pub fn moderation_chat(&self) -> Result<i64> {
        self.targets
            .moderation_chat
            .ok_or_else(|| ModerationError::Configuration("moderation chat is not set".into()))
    }

    /// Publication channel destination; required before a proposal may be
    /// published.
    pub fn publication_channel(&self) -> Result<i64> {
        self.targets
            .publication_channel
            .ok_or_else(|| ModerationError::Configuration("publication channel is not set".into()))
    }

    /// Chat carrying the public reputation labels. The moderation chat
    /// doubles as the title chat when no separate one is configured;
    /// `None` disables label mirroring entirely.
    pub fn title_chat(&self) -> Option<i64> {
        self.targets.title_chat.or(self.targets.moderation_chat)
    }

    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }
}
