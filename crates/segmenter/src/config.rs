use crate::error::{Result, SegmenterError};
use serde::{Deserialize, Serialize};

/// Configuration for page segmentation behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Minimum packed chunk size in characters; the generic strategy flushes
    /// its buffer once this is reached
    pub min_chunk_chars: usize,

    /// Maximum packed chunk size in characters; the generic strategy flushes
    /// before a candidate that would cross it
    pub max_chunk_chars: usize,

    /// Candidates with less trimmed text than this are discarded outright
    pub min_candidate_chars: usize,

    /// CSS selectors for content-bearing candidates of the generic strategy
    pub candidate_selectors: Vec<String>,

    /// Case-insensitive patterns for boilerplate candidates (cookie bars,
    /// login/subscribe prompts and localized equivalents)
    pub boilerplate_patterns: Vec<String>,

    /// Maximum heading section size in characters; longer sections are cut
    /// into consecutive slices sharing the heading's anchor
    pub max_section_chars: usize,

    /// Heading sections shorter than this are dropped
    pub min_section_chars: usize,

    /// Host-name fragments of sites whose short one-line sections are
    /// legitimate and exempt from the minimum section filter
    pub short_section_hosts: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: 100,
            max_chunk_chars: 3000,
            min_candidate_chars: 30,
            candidate_selectors: default_candidate_selectors(),
            boilerplate_patterns: vec![r"^\s*(cookie|accept|subscribe|登录|注册)".to_string()],
            max_section_chars: 3000,
            min_section_chars: 50,
            short_section_hosts: vec!["wikipedia".to_string()],
        }
    }
}

impl SegmenterConfig {
    /// Config producing smaller chunks, for narrow panels where long labels
    /// and long jumps read poorly
    #[must_use]
    pub fn fine_grained() -> Self {
        Self {
            min_chunk_chars: 60,
            max_chunk_chars: 1200,
            max_section_chars: 1200,
            ..Default::default()
        }
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 || self.max_section_chars == 0 {
            return Err(SegmenterError::invalid_config(
                "maximum chunk and section sizes must be positive",
            ));
        }
        if self.min_chunk_chars > self.max_chunk_chars {
            return Err(SegmenterError::invalid_config(format!(
                "min_chunk_chars ({}) exceeds max_chunk_chars ({})",
                self.min_chunk_chars, self.max_chunk_chars
            )));
        }
        if self.min_section_chars > self.max_section_chars {
            return Err(SegmenterError::invalid_config(format!(
                "min_section_chars ({}) exceeds max_section_chars ({})",
                self.min_section_chars, self.max_section_chars
            )));
        }
        if self.candidate_selectors.is_empty() {
            return Err(SegmenterError::invalid_config(
                "candidate_selectors must not be empty",
            ));
        }
        Ok(())
    }

    /// Whether the host is exempt from the minimum section filter
    pub fn allows_short_sections(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.short_section_hosts
            .iter()
            .any(|fragment| host.contains(fragment.as_str()))
    }
}

fn default_candidate_selectors() -> Vec<String> {
    [
        "article",
        "section",
        "main",
        "blockquote",
        "p",
        "li",
        "pre",
        "div[role='article']",
        "div[role='main']",
        "div[role='region']",
        "div.markdown",
        "div.prose",
        "div.message",
        "div.chat-message",
        "div.post",
        "div.comment",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
