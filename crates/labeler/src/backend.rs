use crate::error::Result;
use crate::fallback::fallback_label;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default instructions handed to every labeling call.
pub const DEFAULT_INSTRUCTIONS: &str =
    "Write a concise, natural section title of at most five words. \
     Do not mention site or product names.";

/// Capability state the backend reports. Re-checked on every cold start;
/// never assumed to hold beyond the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Sessions can be created now.
    Ready,
    /// The model is being fetched; labeling degrades for this pass only.
    Downloading,
    /// The capability is absent or denied.
    Unavailable,
}

/// What kind of label a session should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelKind {
    Headline,
    KeyPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelLength {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelFormat {
    PlainText,
    Markdown,
}

/// Session creation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionProfile {
    pub kind: LabelKind,
    pub length: LabelLength,
    pub format: LabelFormat,
    /// Context shared across every call of the session.
    pub shared_context: String,
    pub temperature: f32,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            kind: LabelKind::Headline,
            length: LabelLength::Short,
            format: LabelFormat::PlainText,
            shared_context: "This is a text section.".to_string(),
            temperature: 0.4,
        }
    }
}

/// The opaque labeling capability.
#[async_trait]
pub trait LabelBackend: Send + Sync {
    /// Current capability state.
    async fn availability(&self) -> Availability;

    /// Creates a labeling session. Fails unless the backend is ready.
    async fn create_session(&self, profile: &SessionProfile) -> Result<Box<dyn LabelSession>>;
}

/// One live labeling session, reused across calls until explicitly reset.
#[async_trait]
pub trait LabelSession: Send + Sync {
    /// Produces a short label for the text. May fail per call; the caller
    /// degrades that chunk alone, never the batch.
    async fn label(&self, text: &str, instructions: &str) -> Result<String>;
}

impl std::fmt::Debug for dyn LabelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelSession").finish_non_exhaustive()
    }
}

/// Always-ready backend that labels through the local heuristic. The
/// model-less mode: deterministic, instant, and good enough to demo the
/// pipeline end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBackend;

#[async_trait]
impl LabelBackend for HeuristicBackend {
    async fn availability(&self) -> Availability {
        Availability::Ready
    }

    async fn create_session(&self, _profile: &SessionProfile) -> Result<Box<dyn LabelSession>> {
        Ok(Box::new(HeuristicSession))
    }
}

struct HeuristicSession;

#[async_trait]
impl LabelSession for HeuristicSession {
    async fn label(&self, text: &str, _instructions: &str) -> Result<String> {
        Ok(fallback_label(text))
    }
}
