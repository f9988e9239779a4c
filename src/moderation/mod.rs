//! Moderation State Machine
//!
//! Interprets moderator button presses against current proposal state,
//! performs the guarded transition, triggers side effects (publication
//! copy, reputation delta, ban), and re-renders the control card. The
//! submission flow that feeds proposals into the machine lives here too.

pub mod action;
pub mod engine;
pub mod submit;

pub use action::{parse_callback, BanPeriod, ModeratorAction};
pub use engine::{ActionOutcome, ModerationEngine, ProposalInfo};
pub use submit::{EnterOutcome, IncomingSubmission, SubmissionBody, SubmissionFlow, SubmitOutcome};
