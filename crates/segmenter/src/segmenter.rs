use crate::config::SegmenterConfig;
use crate::error::{Result, SegmenterError};
use crate::selector::{
    choose_strategy, static_selector, StrategyKind, StructuredLayout, ASSISTANT_TURN_SELECTOR,
    HEADING_SELECTOR,
};
use log::debug;
use once_cell::sync::Lazy;
use outliner_dom::{compile_selector, is_visible, visible_text, AnchorRegistry, PageSnapshot};
use outliner_protocol::{AnchorId, Chunk};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Selector};
use std::collections::HashSet;

static ASSISTANT_TURNS: Lazy<Selector> = Lazy::new(|| static_selector(ASSISTANT_TURN_SELECTOR));
static HEADINGS: Lazy<Selector> = Lazy::new(|| static_selector(HEADING_SELECTOR));

/// Result of one segmentation pass.
#[derive(Debug)]
pub struct Segmentation {
    pub strategy: StrategyKind,
    pub chunks: Vec<Chunk>,
}

/// Turns a page snapshot into ordered, anchored chunks.
///
/// Selectors and boilerplate patterns are compiled once at construction;
/// every [`Segmenter::segment`] call re-derives the strategy from current
/// page signals and produces a fresh chunk list.
pub struct Segmenter {
    config: SegmenterConfig,
    candidates: Selector,
    boilerplate: Vec<Regex>,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        config.validate()?;
        let candidates = compile_selector(&config.candidate_selectors.join(", "))?;
        let boilerplate = config
            .boilerplate_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| SegmenterError::invalid_pattern(pattern, err.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            candidates,
            boilerplate,
        })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Runs the strategy selector and the chosen strategy over the page.
    /// Chunks come back in reading order, every one non-empty and anchored.
    pub fn segment(&self, page: &PageSnapshot, anchors: &mut AnchorRegistry) -> Segmentation {
        let strategy = choose_strategy(page);
        debug!("segmenting {} with {strategy}", page.host());

        let raw = match strategy {
            StrategyKind::ChatTranscript => self.segment_chat(page, anchors),
            StrategyKind::Structured(layout) => self.segment_structured(page, anchors, layout),
            StrategyKind::HeadingOutline => self.segment_heading(page, anchors),
            StrategyKind::Generic => self.segment_generic(page, anchors),
        };
        let chunks = clean(raw);
        debug!("{} chunks after cleanup ({strategy})", chunks.len());
        Segmentation { strategy, chunks }
    }

    /// Candidate packing: visible content-bearing elements are filtered and
    /// greedily buffered; the buffer flushes before a candidate that would
    /// cross the maximum, or as soon as the minimum is met. The chunk keeps
    /// the first packed candidate's anchor.
    fn segment_generic(&self, page: &PageSnapshot, anchors: &mut AnchorRegistry) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut consumed: HashSet<ego_tree::NodeId> = HashSet::new();
        let mut buffer: Vec<String> = Vec::new();
        let mut buffer_len = 0usize;
        let mut buffer_anchor: Option<AnchorId> = None;

        for element in page.select(&self.candidates) {
            if !is_visible(element) {
                continue;
            }
            // A candidate inside an already-packed candidate would duplicate
            // its text.
            if element.ancestors().any(|node| consumed.contains(&node.id())) {
                continue;
            }
            let text = visible_text(element);
            let text_len = text.chars().count();
            if text_len < self.config.min_candidate_chars {
                continue;
            }
            if self.is_boilerplate(&text) {
                continue;
            }
            consumed.insert(element.id());
            let anchor = anchors.ensure_anchor(element);

            if buffer_len > 0 && buffer_len + text_len > self.config.max_chunk_chars {
                flush(&mut chunks, &mut buffer, &mut buffer_len, &mut buffer_anchor);
            }
            if buffer.is_empty() {
                buffer_anchor = Some(anchor);
            }
            buffer.push(text);
            buffer_len += text_len;
            if buffer_len >= self.config.min_chunk_chars {
                flush(&mut chunks, &mut buffer, &mut buffer_len, &mut buffer_anchor);
            }
        }
        flush(&mut chunks, &mut buffer, &mut buffer_len, &mut buffer_anchor);
        chunks
    }

    /// One chunk per assistant turn, user turns excluded.
    fn segment_chat(&self, page: &PageSnapshot, anchors: &mut AnchorRegistry) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for element in page.select(&ASSISTANT_TURNS) {
            if !is_visible(element) {
                continue;
            }
            let text = visible_text(element);
            if text.is_empty() {
                continue;
            }
            let anchor = anchors.ensure_anchor(element);
            chunks.push(Chunk::new(text, anchor));
        }
        chunks
    }

    /// One chunk per vendor response container, preferring the layout's
    /// inner content wrapper over the container's own text.
    fn segment_structured(
        &self,
        page: &PageSnapshot,
        anchors: &mut AnchorRegistry,
        layout: &'static StructuredLayout,
    ) -> Vec<Chunk> {
        let container_selector = static_selector(layout.container);
        let inner_selector = static_selector(layout.inner);

        let mut chunks = Vec::new();
        for container in page.select(&container_selector) {
            if !is_visible(container) {
                continue;
            }
            let text = container
                .select(&inner_selector)
                .find(|inner| is_visible(*inner))
                .map(visible_text)
                .unwrap_or_else(|| visible_text(container));
            if text.is_empty() {
                continue;
            }
            let anchor = anchors.ensure_anchor(container);
            chunks.push(Chunk::new(text, anchor));
        }
        chunks
    }

    /// Heading-delimited sections: each visible heading plus its following
    /// sibling elements up to the next heading. Oversized sections are cut
    /// into fixed-size slices that all share the heading's anchor.
    fn segment_heading(&self, page: &PageSnapshot, anchors: &mut AnchorRegistry) -> Vec<Chunk> {
        let headings: Vec<ElementRef<'_>> = page
            .select(&HEADINGS)
            .filter(|el| is_visible(*el))
            .collect();
        if headings.is_empty() {
            debug!("no visible headings on {}, packing generically", page.host());
            return self.segment_generic(page, anchors);
        }

        let allow_short = self.config.allows_short_sections(page.host());
        let mut chunks = Vec::new();
        for heading in headings {
            let mut section = visible_text(heading);
            for sibling in heading.next_siblings() {
                let Some(element) = ElementRef::wrap(sibling) else {
                    continue;
                };
                if is_heading(element) {
                    break;
                }
                if !is_visible(element) {
                    continue;
                }
                let text = visible_text(element);
                if text.is_empty() {
                    continue;
                }
                section.push_str("\n\n");
                section.push_str(&text);
            }

            let section_len = section.chars().count();
            if section_len < self.config.min_section_chars && !allow_short {
                continue;
            }
            let anchor = anchors.ensure_anchor(heading);
            if section_len <= self.config.max_section_chars {
                chunks.push(Chunk::new(section, anchor));
            } else {
                for slice in char_slices(&section, self.config.max_section_chars) {
                    chunks.push(Chunk::new(slice, anchor.clone()));
                }
            }
        }
        chunks
    }

    fn is_boilerplate(&self, text: &str) -> bool {
        self.boilerplate.iter().any(|pattern| pattern.is_match(text))
    }
}

fn is_heading(element: ElementRef<'_>) -> bool {
    matches!(
        element.value().name(),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn flush(
    chunks: &mut Vec<Chunk>,
    buffer: &mut Vec<String>,
    buffer_len: &mut usize,
    buffer_anchor: &mut Option<AnchorId>,
) {
    if buffer.is_empty() {
        return;
    }
    let text = buffer.join("\n\n");
    if let Some(anchor) = buffer_anchor.take() {
        chunks.push(Chunk::new(text, anchor));
    }
    buffer.clear();
    *buffer_len = 0;
}

fn char_slices(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|slice| slice.iter().collect())
        .collect()
}

/// Final pass shared by all strategies: drop anything unanchored or blank,
/// keep relative order.
fn clean(chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .filter(|chunk| !chunk.text.trim().is_empty() && !chunk.anchor_id.is_empty())
        .collect()
}
