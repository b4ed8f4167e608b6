use crate::config::EngineConfig;
use crate::driver::LabelDriver;
use crate::error::{EngineError, Result};
use crate::outline::{OutlineState, RebuildOutcome};
use log::{debug, info, warn};
use outliner_dom::{AnchorRegistry, PageSnapshot};
use outliner_labeler::LabelBackend;
use outliner_protocol::{AnchorId, InstanceId, PagePush, PanelReply, PanelRequest, StatusPhase};
use outliner_segmenter::{Segmenter, StrategyKind};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};

enum InstanceCommand {
    /// Label the next pending batch, if any.
    LabelRest,
    /// Label exactly `[start, end)`, dropped when `generation` is stale.
    LabelRange {
        start: usize,
        end: usize,
        generation: u64,
    },
    /// Record jump markers for these anchors; they expire on their own.
    MarkSpan { anchors: Vec<AnchorId> },
    ResetSession,
    Shutdown,
}

/// A highlight record left behind by a jump, cleared after its TTL.
#[derive(Debug, Clone)]
struct JumpMarker {
    anchor_id: AnchorId,
    expires_at: Instant,
}

struct InstanceState {
    page: PageSnapshot,
    anchors: AnchorRegistry,
    outline: OutlineState,
    strategy: StrategyKind,
    viewport_offset: usize,
    jump_markers: Vec<JumpMarker>,
    /// A `LabelRest` command is queued but not yet claimed by the driver.
    /// Together with the outline's in-flight range this makes duplicate
    /// labeling triggers no-ops instead of extra batches.
    label_rest_queued: bool,
}

/// One page's outline producer: the parsed snapshot, its anchors, the
/// chunk-aligned outline, and a driver task that labels pending entries in
/// the background.
///
/// Cloning shares the instance. Requests go through [`PageInstance::handle`];
/// label completions and status changes come back as [`PagePush`] broadcasts,
/// and the latest status is always readable through the watch channel.
/// Dropping the last clone shuts the driver task down.
#[derive(Clone)]
pub struct PageInstance {
    inner: Arc<PageInstanceInner>,
}

struct PageInstanceInner {
    id: InstanceId,
    command_tx: mpsc::Sender<InstanceCommand>,
    push_tx: broadcast::Sender<PagePush>,
    status_tx: watch::Sender<StatusPhase>,
    state: Arc<Mutex<InstanceState>>,
    segmenter: Segmenter,
    _status_guard: watch::Receiver<StatusPhase>,
}

impl PageInstance {
    /// Parses and segments the document, spawns the driver task, and kicks
    /// off labeling for the seeded outline.
    pub fn start(
        id: InstanceId,
        html: &str,
        host: &str,
        segmenter: Segmenter,
        backend: Arc<dyn LabelBackend>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let page = PageSnapshot::parse(html, host);
        let mut anchors = AnchorRegistry::new();
        let segmentation = segmenter.segment(&page, &mut anchors);
        let mut outline = OutlineState::new();
        let strategy = segmentation.strategy;
        outline.reset_from(segmentation.chunks);
        info!(
            "{id}: segmented {host} into {} chunks with {strategy}",
            outline.len()
        );

        let initial_phase = if outline.is_empty() {
            StatusPhase::Finished
        } else {
            StatusPhase::Loading
        };

        let state = Arc::new(Mutex::new(InstanceState {
            page,
            anchors,
            outline,
            strategy,
            viewport_offset: 0,
            jump_markers: Vec::new(),
            label_rest_queued: initial_phase == StatusPhase::Loading,
        }));

        let (command_tx, command_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(initial_phase);
        let (push_tx, _) = broadcast::channel(32);

        let driver = LabelDriver::new(backend, config.profile.clone(), config.instructions.clone());
        let task = DriverTask {
            id,
            state: state.clone(),
            driver,
            config,
            push_tx: push_tx.clone(),
            status_tx: status_tx.clone(),
            last_phase: initial_phase,
        };
        tokio::spawn(task.run(command_rx));

        if initial_phase == StatusPhase::Loading {
            let _ = command_tx.try_send(InstanceCommand::LabelRest);
        }

        Ok(Self {
            inner: Arc::new(PageInstanceInner {
                id,
                command_tx,
                push_tx,
                status_tx,
                state,
                segmenter,
                _status_guard: status_rx,
            }),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Segmentation strategy the current outline was produced with.
    pub fn strategy(&self) -> StrategyKind {
        lock_state(&self.inner.state).strategy
    }

    #[must_use]
    pub fn status(&self) -> StatusPhase {
        *self.inner.status_tx.subscribe().borrow()
    }

    #[must_use]
    pub fn status_stream(&self) -> watch::Receiver<StatusPhase> {
        self.inner.status_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_pushes(&self) -> broadcast::Receiver<PagePush> {
        self.inner.push_tx.subscribe()
    }

    /// Serves one consumer request.
    ///
    /// `GetOutline` returns the outline as it stands, pending sentinels
    /// included, and queues one more labeling batch when entries are still
    /// pending and none is in flight or queued. Consumers learn about the
    /// written labels through `OutlineChanged` pushes and re-fetch; each
    /// re-fetch is what advances a long document to the next batch.
    pub async fn handle(&self, request: PanelRequest) -> Result<PanelReply> {
        match request {
            PanelRequest::GetOutline => {
                let (entries, trigger) = {
                    let mut st = lock_state(&self.inner.state);
                    let trigger = st.outline.first_pending().is_some()
                        && !st.outline.is_labeling()
                        && !st.label_rest_queued;
                    st.label_rest_queued |= trigger;
                    (st.outline.snapshot(), trigger)
                };
                if trigger {
                    self.send(InstanceCommand::LabelRest).await?;
                }
                Ok(PanelReply::Outline { entries })
            }
            PanelRequest::JumpTo {
                anchor_id,
                next_anchor_id,
            } => {
                let span = {
                    let mut st = lock_state(&self.inner.state);
                    let InstanceState {
                        page,
                        anchors,
                        viewport_offset,
                        ..
                    } = &mut *st;
                    match anchors.offset_of(page, &anchor_id) {
                        Some(offset) => {
                            *viewport_offset = offset;
                            let mut span = vec![anchor_id];
                            if let Some(next) = next_anchor_id {
                                if anchors.resolve(page, &next).is_some() {
                                    span.push(next);
                                }
                            }
                            Some(span)
                        }
                        None => {
                            warn!(
                                "{}: jump target {anchor_id} does not resolve in the current document",
                                self.inner.id
                            );
                            None
                        }
                    }
                };
                if let Some(anchors) = span {
                    self.send(InstanceCommand::MarkSpan { anchors }).await?;
                }
                Ok(PanelReply::Ack)
            }
            PanelRequest::GetActiveByScroll => {
                let st = lock_state(&self.inner.state);
                let viewport = st.viewport_offset;
                let mut best: Option<(usize, AnchorId)> = None;
                for entry in st.outline.entries() {
                    let Some(offset) = st.anchors.offset_of(&st.page, &entry.anchor_id) else {
                        continue;
                    };
                    let distance = offset.abs_diff(viewport);
                    let closer = match &best {
                        Some((best_distance, _)) => distance < *best_distance,
                        None => true,
                    };
                    if closer {
                        best = Some((distance, entry.anchor_id.clone()));
                    }
                }
                Ok(PanelReply::ActiveAnchor {
                    anchor_id: best.map(|(_, anchor_id)| anchor_id),
                })
            }
            PanelRequest::GetChunkText { anchor_id } => {
                let text = lock_state(&self.inner.state)
                    .outline
                    .chunk_text(&anchor_id)
                    .map(ToString::to_string);
                Ok(PanelReply::ChunkText { text })
            }
            PanelRequest::Reinit => {
                self.reinitialize().await?;
                Ok(PanelReply::Ack)
            }
            PanelRequest::CheckForNewContent => {
                self.rebuild().await?;
                Ok(PanelReply::Ack)
            }
        }
    }

    /// Re-segments the current snapshot and folds the result into the
    /// outline. Growth appends pending entries and queues a labeling pass
    /// for exactly the appended range; anything else leaves the outline as
    /// it was.
    pub async fn rebuild(&self) -> Result<RebuildOutcome> {
        let (outcome, generation) = {
            let mut st = lock_state(&self.inner.state);
            let InstanceState {
                page,
                anchors,
                outline,
                strategy,
                ..
            } = &mut *st;
            outline.begin_resegmenting();
            let segmentation = self.inner.segmenter.segment(page, anchors);
            *strategy = segmentation.strategy;
            (
                outline.apply_rebuild(segmentation.chunks),
                outline.generation(),
            )
        };
        match outcome {
            RebuildOutcome::Appended { start, end } => {
                info!("{}: rebuild appended chunks [{start}, {end})", self.inner.id);
                self.send(InstanceCommand::LabelRange {
                    start,
                    end,
                    generation,
                })
                .await?;
            }
            RebuildOutcome::Shrunk { old, new } => {
                warn!(
                    "{}: segmentation shrank from {old} to {new} chunks; keeping the existing outline",
                    self.inner.id
                );
            }
            RebuildOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    /// Throws the outline away and starts over from the current snapshot:
    /// fresh anchors, fresh labeling session, everything pending again.
    pub async fn reinitialize(&self) -> Result<()> {
        let (len, strategy) = {
            let mut st = lock_state(&self.inner.state);
            let InstanceState {
                page,
                anchors,
                outline,
                strategy,
                jump_markers,
                ..
            } = &mut *st;
            anchors.reset();
            jump_markers.clear();
            let segmentation = self.inner.segmenter.segment(page, anchors);
            *strategy = segmentation.strategy;
            outline.reset_from(segmentation.chunks);
            let summary = (outline.len(), *strategy);
            st.label_rest_queued = true;
            summary
        };
        info!(
            "{}: reinitialized into {len} chunks with {strategy}",
            self.inner.id
        );
        self.send(InstanceCommand::ResetSession).await?;
        self.send(InstanceCommand::LabelRest).await
    }

    /// Swaps in a fresh snapshot of the same page, keeping anchors and the
    /// outline. Follow up with `CheckForNewContent` to fold new content in,
    /// or `Reinit` when the page changed identity.
    pub fn update_document(&self, html: &str) {
        let mut st = lock_state(&self.inner.state);
        let host = st.page.host().to_string();
        st.page = PageSnapshot::parse(html, &host);
    }

    /// Records where the viewport sits, as a document-order text offset.
    pub fn set_viewport(&self, offset: usize) {
        lock_state(&self.inner.state).viewport_offset = offset;
    }

    /// Anchors of jump markers that have not expired yet.
    pub fn active_markers(&self) -> Vec<AnchorId> {
        let now = Instant::now();
        lock_state(&self.inner.state)
            .jump_markers
            .iter()
            .filter(|marker| marker.expires_at > now)
            .map(|marker| marker.anchor_id.clone())
            .collect()
    }

    async fn send(&self, command: InstanceCommand) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| EngineError::DriverGone)
    }
}

impl std::fmt::Debug for PageInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageInstance")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

impl Drop for PageInstance {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(InstanceCommand::Shutdown);
        }
    }
}

/// The background half of a page instance: owns the labeling driver and
/// processes commands one at a time, so labeling passes never overlap.
struct DriverTask {
    id: InstanceId,
    state: Arc<Mutex<InstanceState>>,
    driver: LabelDriver,
    config: EngineConfig,
    push_tx: broadcast::Sender<PagePush>,
    status_tx: watch::Sender<StatusPhase>,
    last_phase: StatusPhase,
}

impl DriverTask {
    async fn run(mut self, mut command_rx: mpsc::Receiver<InstanceCommand>) {
        loop {
            let marker_deadline = self.next_marker_deadline();

            tokio::select! {
                cmd = command_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match cmd {
                        InstanceCommand::LabelRest => {
                            lock_state(&self.state).label_rest_queued = false;
                            self.label_rest().await;
                        }
                        InstanceCommand::LabelRange { start, end, generation } => {
                            self.label_span(start, end, generation).await;
                        }
                        InstanceCommand::MarkSpan { anchors } => self.mark_span(anchors),
                        InstanceCommand::ResetSession => self.driver.reset(),
                        InstanceCommand::Shutdown => break,
                    }
                }
                () = async {
                    if let Some(deadline) = marker_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if marker_deadline.is_some() => {
                    self.expire_markers();
                }
            }
        }
    }

    /// Labels the next pending batch, if any. One trigger advances the
    /// outline by at most one batch; long documents finish because each
    /// `OutlineChanged` push makes consumers re-fetch, and the re-fetch
    /// queues the batch after.
    async fn label_rest(&mut self) {
        let batch = {
            let st = lock_state(&self.state);
            st.outline
                .next_batch(self.config.batch_size)
                .map(|(start, end)| (start, end, st.outline.generation()))
        };
        let Some((start, end, generation)) = batch else {
            self.announce_idle();
            return;
        };
        self.label_batch(start, end, generation).await;
    }

    async fn label_span(&mut self, start: usize, end: usize, generation: u64) {
        let mut cursor = start;
        while cursor < end {
            let batch_end = (cursor + self.config.batch_size).min(end);
            if !self.label_batch(cursor, batch_end, generation).await {
                return;
            }
            cursor = batch_end;
        }
    }

    /// Runs one labeling pass over `[start, end)`. Returns `false` when the
    /// pass was dropped: the outline moved to a new generation, or the range
    /// no longer claims cleanly.
    async fn label_batch(&mut self, start: usize, end: usize, generation: u64) -> bool {
        let texts = {
            let mut st = lock_state(&self.state);
            if st.outline.generation() != generation {
                debug!("{}: dropping a label batch aimed at a superseded outline", self.id);
                return false;
            }
            let end = end.min(st.outline.len());
            if !st.outline.begin_labeling(start, end) {
                return false;
            }
            st.outline.chunk_texts(start, end)
        };
        let end = start + texts.len();

        self.set_status(StatusPhase::Loading);
        let (labels, phase) = self.driver.label_texts(&texts).await;

        let fully = {
            let mut st = lock_state(&self.state);
            if st.outline.generation() != generation {
                debug!(
                    "{}: discarding {} labels written for a superseded outline",
                    self.id,
                    labels.len()
                );
                return false;
            }
            st.outline.write_labels(start, &labels);
            st.outline.finish_labeling();
            st.outline.is_fully_labeled()
        };

        let settled = if phase == StatusPhase::Ready && fully {
            StatusPhase::Finished
        } else {
            phase
        };
        self.set_status(settled);
        let _ = self.push_tx.send(PagePush::OutlineChanged { start, end });
        true
    }

    /// Announces `Finished` when a labeling request found nothing left to
    /// do. A lingering `Failed` or `Downloading` phase stays visible.
    fn announce_idle(&mut self) {
        let fully = lock_state(&self.state).outline.is_fully_labeled();
        if fully
            && !matches!(
                self.last_phase,
                StatusPhase::Failed | StatusPhase::Downloading
            )
        {
            self.set_status(StatusPhase::Finished);
        }
    }

    fn mark_span(&self, anchors: Vec<AnchorId>) {
        let expires_at = Instant::now() + self.config.jump_marker_ttl;
        let mut st = lock_state(&self.state);
        // A new jump supersedes the previous span.
        st.jump_markers.clear();
        st.jump_markers.extend(
            anchors
                .into_iter()
                .map(|anchor_id| JumpMarker { anchor_id, expires_at }),
        );
    }

    fn expire_markers(&self) {
        let now = Instant::now();
        let mut st = lock_state(&self.state);
        let before = st.jump_markers.len();
        st.jump_markers.retain(|marker| marker.expires_at > now);
        if st.jump_markers.len() < before {
            debug!("{}: jump markers expired", self.id);
        }
    }

    fn next_marker_deadline(&self) -> Option<Instant> {
        lock_state(&self.state)
            .jump_markers
            .iter()
            .map(|marker| marker.expires_at)
            .min()
    }

    fn set_status(&mut self, phase: StatusPhase) {
        if phase == self.last_phase {
            return;
        }
        self.last_phase = phase;
        let _ = self.status_tx.send(phase);
        let _ = self.push_tx.send(PagePush::Status { phase });
    }
}

fn lock_state(state: &Mutex<InstanceState>) -> MutexGuard<'_, InstanceState> {
    state.lock().expect("page instance state lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use outliner_labeler::HeuristicBackend;
    use outliner_segmenter::SegmenterConfig;
    use pretty_assertions::assert_eq;

    fn default_segmenter() -> Segmenter {
        Segmenter::new(SegmenterConfig::default()).expect("segmenter")
    }

    #[tokio::test]
    async fn empty_page_starts_finished_with_an_empty_outline() {
        let instance = PageInstance::start(
            InstanceId(1),
            "<html><body></body></html>",
            "example.org",
            default_segmenter(),
            Arc::new(HeuristicBackend::default()),
            EngineConfig::default(),
        )
        .expect("start");

        assert_eq!(instance.status(), StatusPhase::Finished);
        let reply = instance
            .handle(PanelRequest::GetOutline)
            .await
            .expect("reply");
        let PanelReply::Outline { entries } = reply else {
            panic!("expected an outline, got {reply:?}");
        };
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_anything_spawns() {
        let config = EngineConfig {
            batch_size: 0,
            ..EngineConfig::default()
        };
        let err = PageInstance::start(
            InstanceId(2),
            "<p>text</p>",
            "example.org",
            default_segmenter(),
            Arc::new(HeuristicBackend::default()),
            config,
        )
        .expect_err("zero batch size must fail");
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
