//! Message and data shapes exchanged between a page-side outline producer
//! and a panel-side consumer. Field and tag casing matches the embedding's
//! JavaScript side, so a webview host can forward these verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel label for outline entries whose real label has not arrived yet.
/// Distinct from every label the fallback heuristic can produce.
pub const PENDING_LABEL: &str = "…";

/// Stable handle bound to one document location. Serializes as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(String);

impl AnchorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnchorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AnchorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of one producer page instance (a tab, in browser terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// One segmented block of readable page text. Ordering within a segmentation
/// pass matches reading order of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub text: String,
    pub anchor_id: AnchorId,
}

impl Chunk {
    pub fn new(text: impl Into<String>, anchor_id: impl Into<AnchorId>) -> Self {
        Self {
            text: text.into(),
            anchor_id: anchor_id.into(),
        }
    }
}

/// One outline row, index-aligned with its chunk at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineEntry {
    pub label: String,
    pub anchor_id: AnchorId,
}

impl OutlineEntry {
    pub fn pending(anchor_id: impl Into<AnchorId>) -> Self {
        Self {
            label: PENDING_LABEL.to_string(),
            anchor_id: anchor_id.into(),
        }
    }

    pub fn labeled(label: impl Into<String>, anchor_id: impl Into<AnchorId>) -> Self {
        Self {
            label: label.into(),
            anchor_id: anchor_id.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.label == PENDING_LABEL
    }
}

/// Coarse producer status surfaced to the consumer. No error detail crosses
/// this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    /// A labeling pass is running.
    Loading,
    /// The backend exists but is warming up; labels degrade for this pass.
    Downloading,
    /// A labeling session is live.
    Ready,
    /// The backend is unavailable; labels degrade to local heuristics.
    Failed,
    /// Every outline entry has left the pending state.
    Finished,
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            StatusPhase::Loading => "loading",
            StatusPhase::Downloading => "downloading",
            StatusPhase::Ready => "ready",
            StatusPhase::Failed => "failed",
            StatusPhase::Finished => "finished",
        };
        f.write_str(phase)
    }
}

/// Requests a consumer sends to one page instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelRequest {
    GetOutline,
    #[serde(rename_all = "camelCase")]
    JumpTo {
        anchor_id: AnchorId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_anchor_id: Option<AnchorId>,
    },
    GetActiveByScroll,
    #[serde(rename_all = "camelCase")]
    GetChunkText { anchor_id: AnchorId },
    Reinit,
    CheckForNewContent,
}

/// Responses paired with [`PanelRequest`] variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelReply {
    Outline { entries: Vec<OutlineEntry> },
    Ack,
    #[serde(rename_all = "camelCase")]
    ActiveAnchor { anchor_id: Option<AnchorId> },
    ChunkText { text: Option<String> },
}

/// Unsolicited pushes from a page instance to its consumers. Delivery is
/// ordered per instance; consumers re-fetch on receipt rather than trusting
/// the payload alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PagePush {
    /// Labels for outline indices `[start, end)` were rewritten.
    OutlineChanged { start: usize, end: usize },
    Status { phase: StatusPhase },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pending_entry_round_trips_and_is_detected() {
        let entry = OutlineEntry::pending("om-abc12345");
        assert!(entry.is_pending());
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, format!(r#"{{"label":"{PENDING_LABEL}","anchorId":"om-abc12345"}}"#));
        let back: OutlineEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn requests_tag_like_the_javascript_side() {
        let req = PanelRequest::JumpTo {
            anchor_id: AnchorId::from("intro"),
            next_anchor_id: Some(AnchorId::from("body")),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(
            json,
            r#"{"type":"jumpTo","anchorId":"intro","nextAnchorId":"body"}"#
        );

        let bare: PanelRequest = serde_json::from_str(r#"{"type":"getOutline"}"#).unwrap();
        assert_eq!(bare, PanelRequest::GetOutline);
    }

    #[test]
    fn status_phases_serialize_lowercase() {
        let json = serde_json::to_string(&PagePush::Status {
            phase: StatusPhase::Downloading,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"status","phase":"downloading"}"#);
    }
}
