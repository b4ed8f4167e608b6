//! # Outliner DOM
//!
//! Parsed-page capability for the outline engine: an immutable document
//! snapshot with selector queries, static visibility checks, document-order
//! offsets, and stable anchor bindings.
//!
//! Segmentation never touches a global document. It receives a
//! [`PageSnapshot`] plus an [`AnchorRegistry`] owned by the page instance,
//! which keeps every strategy testable against documents built from plain
//! HTML strings.
//!
//! ## Example
//!
//! ```rust
//! use outliner_dom::{compile_selector, is_visible, visible_text, AnchorRegistry, PageSnapshot};
//!
//! let page = PageSnapshot::parse("<article><p id=\"intro\">Hello world</p></article>", "example.org");
//! let paragraphs = compile_selector("p").unwrap();
//! let mut anchors = AnchorRegistry::new();
//! for element in page.select(&paragraphs) {
//!     if is_visible(element) {
//!         let anchor = anchors.ensure_anchor(element);
//!         println!("{anchor}: {}", visible_text(element));
//!     }
//! }
//! ```

mod anchor;
mod error;
mod snapshot;
mod visibility;

pub use anchor::{AnchorMarker, AnchorRegistry, ANCHOR_TOKEN_PREFIX};
pub use error::{DomError, Result};
pub use snapshot::{compile_selector, node_path, visible_text, NodePath, PageSnapshot};
pub use visibility::is_visible;
