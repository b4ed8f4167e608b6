//! # Outliner Labeler
//!
//! The labeling backend contract: an opaque async capability that maps
//! chunk text to a short human-readable label, with availability and
//! warm-up states it reports itself.
//!
//! The engine never assumes the backend is there. It re-checks availability
//! on every cold start, caches one session per page instance, and degrades
//! to [`fallback_label`] whenever the backend cannot serve: the whole batch
//! when the capability is absent or still downloading, a single chunk when
//! one invocation fails.

mod backend;
mod error;
mod fallback;
pub mod testing;

pub use backend::{
    Availability, HeuristicBackend, LabelBackend, LabelFormat, LabelKind, LabelLength,
    LabelSession, SessionProfile, DEFAULT_INSTRUCTIONS,
};
pub use error::{LabelError, Result};
pub use fallback::{fallback_label, FALLBACK_CHAR_BUDGET, FALLBACK_DEFAULT_LABEL};
