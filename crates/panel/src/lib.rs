//! # Outliner Panel
//!
//! Consumer-side half of the outline protocol. A [`Panel`] keeps one cache
//! slot per page instance: the last fetched outline, user annotations keyed
//! by anchor, and the latest pushed status. Switching back to a cached
//! instance renders without a round trip; an `outlineChanged` push replaces
//! only that instance's outline snapshot; navigating away drops the slot.
//!
//! The panel never stores document text or offsets. Rows carry anchor ids,
//! and everything position-dependent (jumps, the active section) is resolved
//! by the producer at request time.

mod error;
mod panel;

pub use error::{PanelError, Result};
pub use panel::{DisplayRow, Panel, ACTIVE_POLL_INTERVAL, DEFAULT_SLOT_CAPACITY};
