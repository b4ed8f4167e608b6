use log::{debug, warn};
use outliner_labeler::{fallback_label, Availability, LabelBackend, LabelSession, SessionProfile};
use outliner_protocol::StatusPhase;
use std::sync::Arc;

/// Careful wrapper around the labeling backend.
///
/// Availability is re-checked on every cold start and the created session is
/// cached until [`LabelDriver::reset`]. Degradation is graded: an absent or
/// warming-up backend downgrades the whole batch to [`fallback_label`], a
/// single failed or empty invocation downgrades only that chunk. Either way
/// every returned label is non-empty and the output order matches the input
/// order exactly.
pub struct LabelDriver {
    backend: Arc<dyn LabelBackend>,
    session: Option<Box<dyn LabelSession>>,
    profile: SessionProfile,
    instructions: String,
}

impl LabelDriver {
    pub fn new(
        backend: Arc<dyn LabelBackend>,
        profile: SessionProfile,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            session: None,
            profile,
            instructions: instructions.into(),
        }
    }

    /// Discards the cached session; the next batch goes through a full
    /// availability check again.
    pub fn reset(&mut self) {
        self.session = None;
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Labels `texts` in order, one backend call per text. Returns exactly
    /// `texts.len()` labels plus the status phase the batch ended in.
    pub async fn label_texts(&mut self, texts: &[String]) -> (Vec<String>, StatusPhase) {
        if self.session.is_none() {
            if let Err(phase) = self.open_session().await {
                return (fallback_all(texts), phase);
            }
        }
        match &self.session {
            Some(session) => {
                let mut labels = Vec::with_capacity(texts.len());
                for text in texts {
                    let label = match session.label(text, &self.instructions).await {
                        Ok(label) if !label.trim().is_empty() => label,
                        Ok(_) => {
                            debug!("backend returned an empty label; using the local fallback");
                            fallback_label(text)
                        }
                        Err(err) => {
                            warn!("labeling call failed: {err}; using the local fallback");
                            fallback_label(text)
                        }
                    };
                    labels.push(label);
                }
                (labels, StatusPhase::Ready)
            }
            None => (fallback_all(texts), StatusPhase::Failed),
        }
    }

    async fn open_session(&mut self) -> std::result::Result<(), StatusPhase> {
        match self.backend.availability().await {
            Availability::Downloading => {
                debug!("label backend is downloading; this batch degrades to local fallbacks");
                Err(StatusPhase::Downloading)
            }
            Availability::Unavailable => {
                warn!("label backend is unavailable; this batch degrades to local fallbacks");
                Err(StatusPhase::Failed)
            }
            Availability::Ready => match self.backend.create_session(&self.profile).await {
                Ok(session) => {
                    debug!("label session created");
                    self.session = Some(session);
                    Ok(())
                }
                Err(err) => {
                    warn!("label session creation failed: {err}; this batch degrades to local fallbacks");
                    Err(StatusPhase::Failed)
                }
            },
        }
    }
}

fn fallback_all(texts: &[String]) -> Vec<String> {
    texts.iter().map(|text| fallback_label(text)).collect()
}
