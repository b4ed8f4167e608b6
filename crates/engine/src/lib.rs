//! # Outliner Engine
//!
//! The page-side half of the outline pipeline: one [`PageInstance`] per
//! document, owning a parsed snapshot, its anchor registry, the
//! chunk-aligned outline, and a background driver task that labels pending
//! entries through whatever backend it was given.
//!
//! ```text
//!            PanelRequest                 PagePush (broadcast)
//! consumer ──────────────> PageInstance ─────────────────────> consumer
//!                               │    ▲
//!                       commands│    │ shared state
//!                               ▼    │
//!                           DriverTask ──> LabelDriver ──> dyn LabelBackend
//! ```
//!
//! Labeling is incremental: `getOutline` answers immediately with pending
//! sentinels where labels have not arrived and queues at most one batch of
//! labeling work. Each completed batch is announced with an
//! `OutlineChanged` push that tells consumers to re-fetch, and the re-fetch
//! queues the batch after, so long documents settle at the consumer's pace
//! instead of all at once. Re-segmentation treats documents as append-only;
//! growth labels exactly the appended tail, anything else leaves the
//! outline untouched.

mod config;
mod driver;
mod error;
mod instance;
mod outline;

pub use config::{EngineConfig, DEFAULT_BATCH_SIZE, DEFAULT_JUMP_MARKER_TTL};
pub use driver::LabelDriver;
pub use error::{EngineError, Result};
pub use instance::PageInstance;
pub use outline::{OutlinePhase, OutlineState, RebuildOutcome};
