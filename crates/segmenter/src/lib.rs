//! # Outliner Segmenter
//!
//! Turns a page snapshot into an ordered list of anchored text chunks.
//!
//! ## Architecture
//!
//! ```text
//! PageSnapshot + AnchorRegistry
//!     │
//!     ├──> Strategy Selector (ordered first-match rule table)
//!     │    ├─> chat transcript    one chunk per assistant turn
//!     │    ├─> structured layout  one chunk per vendor response container
//!     │    ├─> heading outline    heading + following siblings per section
//!     │    └─> generic            greedy candidate packing
//!     │
//!     └──> Cleanup
//!          └─> drop blank or unanchored chunks, keep reading order
//! ```
//!
//! The selector re-derives the strategy on every pass from current page
//! signals; nothing about the decision is cached.

mod config;
mod error;
mod segmenter;
mod selector;

pub use config::SegmenterConfig;
pub use error::{Result, SegmenterError};
pub use segmenter::{Segmentation, Segmenter};
pub use selector::{choose_strategy, StrategyKind, StructuredLayout};
