use crate::error::{PanelError, Result};
use log::{debug, info};
use lru::LruCache;
use outliner_engine::PageInstance;
use outliner_protocol::{
    AnchorId, InstanceId, OutlineEntry, PagePush, PanelReply, PanelRequest, StatusPhase,
};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

/// How often a visible panel should call [`Panel::poll_active`] for the
/// focused instance.
pub const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(600);

/// How many instances keep a cached slot before the least recently used
/// one is evicted.
pub const DEFAULT_SLOT_CAPACITY: usize = 32;

/// One outline row as the panel shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub label: String,
    pub anchor_id: AnchorId,
    /// The label comes from a user annotation, not the producer.
    pub edited: bool,
    /// The row's anchor sits closest to the viewport.
    pub active: bool,
}

/// Everything the panel remembers about one instance between activations.
struct PanelSlot {
    outline: Vec<OutlineEntry>,
    annotations: HashMap<AnchorId, String>,
    status: StatusPhase,
    active_anchor: Option<AnchorId>,
}

impl PanelSlot {
    fn new(outline: Vec<OutlineEntry>, status: StatusPhase) -> Self {
        Self {
            outline,
            annotations: HashMap::new(),
            status,
            active_anchor: None,
        }
    }
}

/// Consumer-side panel state over any number of page instances.
///
/// One slot per instance holds the last fetched outline, user annotations
/// keyed by anchor, and the latest pushed status. Switching back to a cached
/// instance renders from the slot without a round trip. An `outlineChanged`
/// push replaces that instance's outline snapshot and nothing else; anchor
/// ids survive relabeling, so annotations keep applying. Navigation drops
/// the slot, and the least recently used slot is evicted past capacity.
pub struct Panel {
    slots: LruCache<InstanceId, PanelSlot>,
    focused: Option<InstanceId>,
}

impl Panel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SLOT_CAPACITY)
    }

    /// A zero capacity is bumped to a single slot.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: LruCache::new(capacity),
            focused: None,
        }
    }

    /// Instance the panel currently shows, if any.
    pub fn focused(&self) -> Option<InstanceId> {
        self.focused
    }

    /// Brings an instance to the front. A cached slot renders as it stands;
    /// a cold one fetches the outline first.
    pub async fn activate(&mut self, instance: &PageInstance) -> Result<Vec<DisplayRow>> {
        let id = instance.id();
        self.focused = Some(id);
        if self.slots.get(&id).is_none() {
            debug!("{id}: no cached outline, fetching");
            let outline = fetch_outline(instance).await?;
            self.store(id, PanelSlot::new(outline, instance.status()));
        }
        Ok(self.render(id))
    }

    /// Applies one push from an instance. `OutlineChanged` re-fetches the
    /// outline and swaps it into the slot, leaving annotations untouched;
    /// `Status` is recorded for [`Panel::status`].
    pub async fn handle_push(&mut self, instance: &PageInstance, push: PagePush) -> Result<()> {
        let id = instance.id();
        match push {
            PagePush::OutlineChanged { start, end } => {
                debug!("{id}: labels changed over [{start}, {end}), re-fetching");
                let outline = fetch_outline(instance).await?;
                match self.slots.get_mut(&id) {
                    Some(slot) => slot.outline = outline,
                    None => self.store(id, PanelSlot::new(outline, instance.status())),
                }
            }
            PagePush::Status { phase } => {
                if let Some(slot) = self.slots.get_mut(&id) {
                    slot.status = phase;
                }
            }
        }
        Ok(())
    }

    /// Forgets an instance that navigated away; its anchors no longer mean
    /// anything. The next activation starts cold.
    pub fn navigated(&mut self, id: InstanceId) {
        if self.slots.pop(&id).is_some() {
            info!("{id}: navigation dropped the cached outline");
        }
    }

    /// User-initiated refresh: the producer starts over and the local slot
    /// is dropped so the next render starts cold.
    pub async fn refresh(&mut self, instance: &PageInstance) -> Result<()> {
        let id = instance.id();
        self.slots.pop(&id);
        info!("{id}: refresh requested");
        expect_ack(instance, PanelRequest::Reinit, "reinit").await
    }

    /// Asks the producer to fold freshly appended content into the outline.
    /// Growth comes back as an `outlineChanged` push.
    pub async fn check_for_new_content(&self, instance: &PageInstance) -> Result<()> {
        expect_ack(
            instance,
            PanelRequest::CheckForNewContent,
            "checkForNewContent",
        )
        .await
    }

    /// Jumps the page to an outline row. The next distinct anchor from the
    /// cached outline rides along so the producer can mark the section span
    /// rather than a single block.
    pub async fn jump(&self, instance: &PageInstance, anchor_id: AnchorId) -> Result<()> {
        let next_anchor_id = self
            .slots
            .peek(&instance.id())
            .and_then(|slot| next_distinct_anchor(&slot.outline, &anchor_id));
        expect_ack(
            instance,
            PanelRequest::JumpTo {
                anchor_id,
                next_anchor_id,
            },
            "jumpTo",
        )
        .await
    }

    /// Pins a user-edited label to an anchor. Annotations overlay the
    /// produced outline at render time and survive outline re-fetches.
    pub fn annotate(&mut self, id: InstanceId, anchor_id: AnchorId, label: impl Into<String>) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.annotations.insert(anchor_id, label.into());
        }
    }

    /// Unpins an annotation, falling back to the produced label. Returns
    /// whether one was pinned.
    pub fn clear_annotation(&mut self, id: InstanceId, anchor_id: &AnchorId) -> bool {
        self.slots
            .get_mut(&id)
            .map_or(false, |slot| slot.annotations.remove(anchor_id).is_some())
    }

    /// One active-section probe; call on [`ACTIVE_POLL_INTERVAL`] while the
    /// panel is visible. The result is remembered so renders can mark the
    /// active row.
    pub async fn poll_active(&mut self, instance: &PageInstance) -> Result<Option<AnchorId>> {
        let reply = instance.handle(PanelRequest::GetActiveByScroll).await?;
        let PanelReply::ActiveAnchor { anchor_id } = reply else {
            return Err(PanelError::UnexpectedReply {
                request: "getActiveByScroll",
            });
        };
        if let Some(slot) = self.slots.get_mut(&instance.id()) {
            slot.active_anchor = anchor_id.clone();
        }
        Ok(anchor_id)
    }

    /// Fetches the source text behind one outline row.
    pub async fn chunk_text(
        &self,
        instance: &PageInstance,
        anchor_id: AnchorId,
    ) -> Result<Option<String>> {
        match instance
            .handle(PanelRequest::GetChunkText { anchor_id })
            .await?
        {
            PanelReply::ChunkText { text } => Ok(text),
            _ => Err(PanelError::UnexpectedReply {
                request: "getChunkText",
            }),
        }
    }

    /// Latest recorded status for an instance with a slot.
    pub fn status(&self, id: InstanceId) -> Option<StatusPhase> {
        self.slots.peek(&id).map(|slot| slot.status)
    }

    /// Joins the cached outline with its annotations and the active anchor.
    /// An instance without a slot renders empty.
    pub fn render(&self, id: InstanceId) -> Vec<DisplayRow> {
        let Some(slot) = self.slots.peek(&id) else {
            return Vec::new();
        };
        slot.outline
            .iter()
            .map(|entry| {
                let annotation = slot.annotations.get(&entry.anchor_id);
                DisplayRow {
                    label: annotation.cloned().unwrap_or_else(|| entry.label.clone()),
                    anchor_id: entry.anchor_id.clone(),
                    edited: annotation.is_some(),
                    active: slot.active_anchor.as_ref() == Some(&entry.anchor_id),
                }
            })
            .collect()
    }

    fn store(&mut self, id: InstanceId, slot: PanelSlot) {
        if let Some((evicted, _)) = self.slots.push(id, slot) {
            if evicted != id {
                debug!("{evicted}: slot evicted to make room for {id}");
            }
        }
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_outline(instance: &PageInstance) -> Result<Vec<OutlineEntry>> {
    match instance.handle(PanelRequest::GetOutline).await? {
        PanelReply::Outline { entries } => Ok(entries),
        _ => Err(PanelError::UnexpectedReply {
            request: "getOutline",
        }),
    }
}

async fn expect_ack(
    instance: &PageInstance,
    request: PanelRequest,
    name: &'static str,
) -> Result<()> {
    match instance.handle(request).await? {
        PanelReply::Ack => Ok(()),
        _ => Err(PanelError::UnexpectedReply { request: name }),
    }
}

/// First anchor after `target` that differs from it, in outline order.
/// Oversized sections split into rows sharing one anchor, so equal ids are
/// skipped.
fn next_distinct_anchor(outline: &[OutlineEntry], target: &AnchorId) -> Option<AnchorId> {
    let position = outline.iter().position(|entry| &entry.anchor_id == target)?;
    outline[position + 1..]
        .iter()
        .map(|entry| &entry.anchor_id)
        .find(|anchor| *anchor != target)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn next_anchor_skips_rows_sharing_the_target_anchor() {
        let outline = vec![
            OutlineEntry::pending("a"),
            OutlineEntry::pending("a"),
            OutlineEntry::pending("b"),
            OutlineEntry::pending("c"),
        ];
        assert_eq!(
            next_distinct_anchor(&outline, &AnchorId::from("a")),
            Some(AnchorId::from("b"))
        );
        assert_eq!(next_distinct_anchor(&outline, &AnchorId::from("c")), None);
        assert_eq!(next_distinct_anchor(&outline, &AnchorId::from("zz")), None);
    }

    #[test]
    fn render_joins_annotations_and_the_active_anchor() {
        let mut panel = Panel::with_capacity(4);
        let id = InstanceId(9);
        let mut slot = PanelSlot::new(
            vec![
                OutlineEntry::labeled("Intro", "a"),
                OutlineEntry::labeled("Body", "b"),
            ],
            StatusPhase::Finished,
        );
        slot.active_anchor = Some(AnchorId::from("b"));
        panel.store(id, slot);
        panel.annotate(id, AnchorId::from("a"), "My intro");

        let rows = panel.render(id);
        assert_eq!(rows[0].label, "My intro");
        assert!(rows[0].edited && !rows[0].active);
        assert_eq!(rows[1].label, "Body");
        assert!(!rows[1].edited && rows[1].active);
    }

    #[test]
    fn zero_capacity_still_keeps_one_slot() {
        let mut panel = Panel::with_capacity(0);
        panel.store(
            InstanceId(1),
            PanelSlot::new(Vec::new(), StatusPhase::Finished),
        );
        assert_eq!(panel.status(InstanceId(1)), Some(StatusPhase::Finished));

        panel.store(
            InstanceId(2),
            PanelSlot::new(Vec::new(), StatusPhase::Loading),
        );
        assert_eq!(panel.status(InstanceId(1)), None);
        assert_eq!(panel.status(InstanceId(2)), Some(StatusPhase::Loading));
    }
}
