//! Postguard
//!
//! Post-proposal moderation service: users submit posts, moderators decide
//! via button presses, accepted posts are copied to a publication channel,
//! and a reputation ledger with timed bans tracks submitter standing.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Service entrypoint
//! ├── config.rs      - Configuration management
//! ├── context.rs     - Shared application context
//! ├── error.rs       - Error taxonomy
//! ├── surface.rs     - Messaging surface boundary + retry helper
//! ├── notices.rs     - Submitter-facing notice templates
//! ├── content/       - Content normalization
//! │   ├── normalize.rs - Style runs -> markup, footer, stripping
//! │   └── fallback.rs  - Ordered edit-fallback chain
//! ├── moderation/    - Moderation state machine
//! │   ├── action.rs  - Button payload parsing
//! │   ├── engine.rs  - Guarded transitions & side effects
//! │   └── submit.rs  - Submission flow
//! ├── reputation/    - Title mirror for the public reputation label
//! ├── store/         - Ledger trait, Postgres and in-memory backends
//! └── sweeper.rs     - Ban expiry sweeper
//! ```

pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod moderation;
pub mod notices;
pub mod reputation;
pub mod store;
pub mod surface;
pub mod sweeper;

// Re-export main types for convenience
pub use config::{AppConfig, DatabaseConfig, LoggingConfig, ServerConfig, SurfaceTargets};
pub use content::{
    apply_markup, render_markup, replace_card, strip_markup, with_footer, EditOutcome, RunKind,
    StyleRun, FOOTER,
};
pub use context::AppContext;
pub use error::{ModerationError, Result};
pub use moderation::{
    parse_callback, ActionOutcome, BanPeriod, EnterOutcome, IncomingSubmission, ModerationEngine,
    ModeratorAction, ProposalInfo, SubmissionBody, SubmissionFlow, SubmitOutcome,
};
pub use reputation::{TitleMirror, ToggleOutcome, REPUTATION_FLOOR};
pub use store::{
    Decision, ExpiredBan, Ledger, LedgerPool, MemoryLedger, ProposalRecord, ProposalStatus,
    UserRecord,
};
pub use surface::{
    with_retry, Clock, ControlCard, DryRunSurface, MessageRef, OutboundContent, Surface,
    SurfaceRole, SystemClock,
};
pub use sweeper::BanSweeper;
