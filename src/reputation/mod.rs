//! Reputation display mirroring.
//!
//! Reputation truth lives in the ledger; the externally visible label is a
//! mirror kept eventually consistent by [`TitleMirror`].

pub mod mirror;

pub use mirror::{TitleMirror, ToggleOutcome, REPUTATION_FLOOR};
