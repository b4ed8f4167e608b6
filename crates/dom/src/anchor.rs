use crate::snapshot::{node_path, NodePath, PageSnapshot};
use outliner_protocol::AnchorId;
use rand::distributions::Alphanumeric;
use rand::Rng;
use scraper::ElementRef;
use std::collections::HashMap;

/// Prefix of minted anchor tokens. Nodes carrying their own `id` attribute
/// reuse that id instead of getting a token.
pub const ANCHOR_TOKEN_PREFIX: &str = "om-";

/// A zero-height marker recorded at a node's start when a token was minted
/// for it. A live-DOM embedding applies these physically so the anchor
/// survives reflow; the snapshot model keeps them as records, which also
/// keeps idempotence observable in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorMarker {
    pub anchor_id: AnchorId,
    pub path: NodePath,
}

/// Anchor bindings for one page instance.
///
/// Owned by the instance and torn down with it; nothing here is global.
/// Bindings are keyed by the node's child-index path, which stays valid
/// across re-parses of an append-only growing document, so incremental
/// rebuilds hand out the same anchors for unchanged content.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    by_path: HashMap<NodePath, AnchorId>,
    by_anchor: HashMap<AnchorId, NodePath>,
    markers: Vec<AnchorMarker>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the anchor bound to the element, binding one first if needed.
    ///
    /// Reuses the element's own non-empty `id` attribute when present;
    /// otherwise mints a randomized token and records a marker. Idempotent:
    /// a second call for the same node returns the same anchor and records
    /// no second marker.
    pub fn ensure_anchor(&mut self, element: ElementRef<'_>) -> AnchorId {
        let path = node_path(*element);
        if let Some(existing) = self.by_path.get(&path) {
            return existing.clone();
        }

        let (anchor, minted) = match element.value().attr("id").filter(|id| !id.is_empty()) {
            Some(id) => (AnchorId::from(id), false),
            None => (AnchorId::new(mint_token()), true),
        };
        self.by_path.insert(path.clone(), anchor.clone());
        self.by_anchor.insert(anchor.clone(), path.clone());
        if minted {
            self.markers.push(AnchorMarker {
                anchor_id: anchor.clone(),
                path,
            });
        }
        anchor
    }

    /// Resolves an anchor back to its element in the given snapshot.
    ///
    /// Tries the recorded path first; anchors that reused a page-provided
    /// `id` also resolve by scanning for that id, which covers documents
    /// whose structure drifted between snapshots.
    pub fn resolve<'a>(
        &self,
        snapshot: &'a PageSnapshot,
        anchor: &AnchorId,
    ) -> Option<ElementRef<'a>> {
        if let Some(path) = self.by_anchor.get(anchor) {
            if let Some(element) = snapshot.element_at_path(path) {
                let minted = anchor.as_str().starts_with(ANCHOR_TOKEN_PREFIX);
                let id_matches = element.value().attr("id") == Some(anchor.as_str());
                if minted || id_matches {
                    return Some(element);
                }
            }
        }
        snapshot.element_by_id(anchor.as_str())
    }

    /// Document-order offset of the anchor's element in the snapshot.
    pub fn offset_of(&self, snapshot: &PageSnapshot, anchor: &AnchorId) -> Option<usize> {
        let element = self.resolve(snapshot, anchor)?;
        snapshot.offset_of(element.id())
    }

    /// Markers minted so far, in binding order.
    pub fn markers(&self) -> &[AnchorMarker] {
        &self.markers
    }

    /// Number of bound anchors.
    pub fn len(&self) -> usize {
        self.by_anchor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anchor.is_empty()
    }

    /// Drops every binding and marker. Used when the page identity changes
    /// and a fresh segmentation pass starts from nothing.
    pub fn reset(&mut self) {
        self.by_path.clear();
        self.by_anchor.clear();
        self.markers.clear();
    }
}

fn mint_token() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{ANCHOR_TOKEN_PREFIX}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::compile_selector;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
        <html><body>
            <p id="intro">Intro paragraph.</p>
            <p>Anonymous paragraph.</p>
        </body></html>
    "#;

    #[test]
    fn reuses_existing_id_without_marker() {
        let page = PageSnapshot::parse(PAGE, "example.org");
        let mut anchors = AnchorRegistry::new();
        let intro = page.element_by_id("intro").expect("intro");
        let anchor = anchors.ensure_anchor(intro);
        assert_eq!(anchor.as_str(), "intro");
        assert!(anchors.markers().is_empty());
    }

    #[test]
    fn mints_token_and_stays_idempotent() {
        let page = PageSnapshot::parse(PAGE, "example.org");
        let selector = compile_selector("p").expect("selector");
        let anonymous = page.select(&selector).nth(1).expect("second p");

        let mut anchors = AnchorRegistry::new();
        let first = anchors.ensure_anchor(anonymous);
        let second = anchors.ensure_anchor(anonymous);

        assert_eq!(first, second);
        assert!(first.as_str().starts_with(ANCHOR_TOKEN_PREFIX));
        assert_eq!(anchors.markers().len(), 1);
        assert_eq!(anchors.len(), 1);
    }

    #[test]
    fn resolves_back_to_the_bound_element() {
        let page = PageSnapshot::parse(PAGE, "example.org");
        let selector = compile_selector("p").expect("selector");
        let anonymous = page.select(&selector).nth(1).expect("second p");

        let mut anchors = AnchorRegistry::new();
        let anchor = anchors.ensure_anchor(anonymous);
        let resolved = anchors.resolve(&page, &anchor).expect("resolves");
        assert_eq!(resolved.id(), anonymous.id());
        assert!(anchors.offset_of(&page, &anchor).is_some());
    }

    #[test]
    fn id_bound_anchor_survives_a_reparse() {
        let grown = PAGE.replace(
            "<p id=\"intro\">",
            "<div><span>injected</span></div><p id=\"intro\">",
        );
        let page = PageSnapshot::parse(PAGE, "example.org");
        let regrown = PageSnapshot::parse(&grown, "example.org");

        let mut anchors = AnchorRegistry::new();
        let intro = page.element_by_id("intro").expect("intro");
        let anchor = anchors.ensure_anchor(intro);

        // Structure shifted, so the recorded path now points elsewhere; the
        // id scan still finds the right element.
        let resolved = anchors.resolve(&regrown, &anchor).expect("resolves");
        assert_eq!(resolved.value().attr("id"), Some("intro"));
    }

    #[test]
    fn reset_drops_everything() {
        let page = PageSnapshot::parse(PAGE, "example.org");
        let selector = compile_selector("p").expect("selector");
        let mut anchors = AnchorRegistry::new();
        for element in page.select(&selector) {
            anchors.ensure_anchor(element);
        }
        assert_eq!(anchors.len(), 2);

        anchors.reset();
        assert!(anchors.is_empty());
        assert!(anchors.markers().is_empty());
    }
}
