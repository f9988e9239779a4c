//! Content normalization and the surface-edit fallback chain.

pub mod fallback;
pub mod normalize;

pub use fallback::{apply_markup, replace_card, EditOutcome};
pub use normalize::{render_markup, strip_markup, with_footer, RunKind, StyleRun, FOOTER};
