//! Scripted test doubles for exercising labeling flows without a model.
//!
//! The real backend lives outside this workspace; tests drive the pipeline
//! through [`ScriptedBackend`], which plays back an availability script,
//! fails on demand, and records every text it was asked to label.

use crate::backend::{Availability, LabelBackend, LabelSession, SessionProfile};
use crate::error::{LabelError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Backend double driven by a script instead of a model.
///
/// Cloning shares the recording state, so a test can keep one handle for
/// assertions while the code under test owns another.
#[derive(Clone)]
pub struct ScriptedBackend {
    state: Arc<ScriptState>,
}

struct ScriptState {
    /// Availability answers played back one per probe; once drained the
    /// steady state repeats forever.
    script: Mutex<VecDeque<Availability>>,
    steady: Mutex<Availability>,
    fail_substrings: Mutex<Vec<String>>,
    blank_substrings: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    sessions_created: Mutex<usize>,
}

impl ScriptedBackend {
    fn with_steady(steady: Availability) -> Self {
        Self {
            state: Arc::new(ScriptState {
                script: Mutex::new(VecDeque::new()),
                steady: Mutex::new(steady),
                fail_substrings: Mutex::new(Vec::new()),
                blank_substrings: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                sessions_created: Mutex::new(0),
            }),
        }
    }

    /// Backend that is ready from the first probe.
    pub fn ready() -> Self {
        Self::with_steady(Availability::Ready)
    }

    /// Backend that never becomes usable.
    pub fn unavailable() -> Self {
        Self::with_steady(Availability::Unavailable)
    }

    /// Backend that reports a download in progress on the first probe and
    /// is ready from the second probe on.
    pub fn downloading_then_ready() -> Self {
        let backend = Self::with_steady(Availability::Ready);
        backend
            .state
            .script
            .lock()
            .expect("script mutex poisoned")
            .push_back(Availability::Downloading);
        backend
    }

    /// Makes every future `label` call whose text contains `needle` fail.
    pub fn fail_when_contains(&self, needle: &str) {
        self.state
            .fail_substrings
            .lock()
            .expect("fail list mutex poisoned")
            .push(needle.to_string());
    }

    /// Makes every future `label` call whose text contains `needle` come
    /// back as an empty string instead of a title.
    pub fn blank_when_contains(&self, needle: &str) {
        self.state
            .blank_substrings
            .lock()
            .expect("blank list mutex poisoned")
            .push(needle.to_string());
    }

    /// Every text labeled so far, in call order.
    pub fn labeled_texts(&self) -> Vec<String> {
        self.state.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// How many sessions were created so far.
    pub fn sessions_created(&self) -> usize {
        *self
            .state
            .sessions_created
            .lock()
            .expect("session counter mutex poisoned")
    }
}

#[async_trait]
impl LabelBackend for ScriptedBackend {
    async fn availability(&self) -> Availability {
        let next = self
            .state
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front();
        match next {
            Some(step) => step,
            None => *self.state.steady.lock().expect("steady mutex poisoned"),
        }
    }

    async fn create_session(&self, _profile: &SessionProfile) -> Result<Box<dyn LabelSession>> {
        let steady = *self.state.steady.lock().expect("steady mutex poisoned");
        match steady {
            Availability::Ready => {
                *self
                    .state
                    .sessions_created
                    .lock()
                    .expect("session counter mutex poisoned") += 1;
                Ok(Box::new(ScriptedSession {
                    state: Arc::clone(&self.state),
                }))
            }
            Availability::Downloading => Err(LabelError::Downloading),
            Availability::Unavailable => Err(LabelError::Unavailable),
        }
    }
}

struct ScriptedSession {
    state: Arc<ScriptState>,
}

#[async_trait]
impl LabelSession for ScriptedSession {
    async fn label(&self, text: &str, _instructions: &str) -> Result<String> {
        self.state
            .calls
            .lock()
            .expect("calls mutex poisoned")
            .push(text.to_string());

        let fails = self
            .state
            .fail_substrings
            .lock()
            .expect("fail list mutex poisoned");
        if let Some(needle) = fails.iter().find(|needle| text.contains(needle.as_str())) {
            return Err(LabelError::invocation(format!(
                "scripted failure on '{needle}'"
            )));
        }
        drop(fails);

        let blanks = self
            .state
            .blank_substrings
            .lock()
            .expect("blank list mutex poisoned");
        if blanks.iter().any(|needle| text.contains(needle.as_str())) {
            return Ok(String::new());
        }

        let prefix: String = text.chars().take(16).collect();
        Ok(format!("title:{prefix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DEFAULT_INSTRUCTIONS;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn script_plays_downloading_before_ready() {
        let backend = ScriptedBackend::downloading_then_ready();
        assert_eq!(backend.availability().await, Availability::Downloading);
        assert_eq!(backend.availability().await, Availability::Ready);
        assert_eq!(backend.availability().await, Availability::Ready);
    }

    #[tokio::test]
    async fn sessions_record_calls_in_order() {
        let backend = ScriptedBackend::ready();
        let session = backend
            .create_session(&SessionProfile::default())
            .await
            .expect("session");

        let first = session.label("alpha text", DEFAULT_INSTRUCTIONS).await;
        let second = session.label("beta text", DEFAULT_INSTRUCTIONS).await;

        assert_eq!(first.expect("first"), "title:alpha text");
        assert_eq!(second.expect("second"), "title:beta text");
        assert_eq!(backend.labeled_texts(), vec!["alpha text", "beta text"]);
        assert_eq!(backend.sessions_created(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_hit_only_matching_texts() {
        let backend = ScriptedBackend::ready();
        backend.fail_when_contains("poison");
        let session = backend
            .create_session(&SessionProfile::default())
            .await
            .expect("session");

        assert!(session
            .label("poison pill", DEFAULT_INSTRUCTIONS)
            .await
            .is_err());
        assert!(session
            .label("healthy text", DEFAULT_INSTRUCTIONS)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unavailable_backend_rejects_sessions() {
        let backend = ScriptedBackend::unavailable();
        let err = backend
            .create_session(&SessionProfile::default())
            .await
            .expect_err("must fail");
        assert!(matches!(err, LabelError::Unavailable));
    }
}
