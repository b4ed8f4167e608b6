use once_cell::sync::Lazy;
use outliner_dom::PageSnapshot;
use scraper::Selector;
use std::fmt;

/// Selector matching assistant turns of the chat-transcript layout.
pub(crate) const ASSISTANT_TURN_SELECTOR: &str = "article[data-turn='assistant']";

/// Selector matching any heading element.
pub(crate) const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

const CHAT_HOSTS: &[&str] = &["chat.openai.com", "chatgpt.com"];

/// One vendor layout for the structured single-response strategy: a
/// response container plus the inner wrapper holding its best text.
#[derive(Debug, PartialEq, Eq)]
pub struct StructuredLayout {
    pub name: &'static str,
    pub hosts: &'static [&'static str],
    pub container: &'static str,
    pub inner: &'static str,
}

pub(crate) static STRUCTURED_LAYOUTS: &[StructuredLayout] = &[
    StructuredLayout {
        name: "gemini",
        hosts: &["gemini.google.com"],
        container: "div.conversation-container",
        inner: "model-response",
    },
    StructuredLayout {
        name: "qwen",
        hosts: &["qwen.ai"],
        container: ".response-message-body--normal",
        inner: ".markdown-content-container",
    },
    StructuredLayout {
        name: "claude",
        hosts: &["claude.ai"],
        container: "div[data-is-streaming='false']",
        inner: ".standard-markdown",
    },
];

/// Which segmentation algorithm a page gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Assistant turns of a chat transcript, one chunk per turn.
    ChatTranscript,
    /// A known vendor response layout, one chunk per container.
    Structured(&'static StructuredLayout),
    /// Heading-delimited sections.
    HeadingOutline,
    /// Candidate packing for arbitrary prose.
    Generic,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::ChatTranscript => f.write_str("chat-transcript"),
            StrategyKind::Structured(layout) => write!(f, "structured:{}", layout.name),
            StrategyKind::HeadingOutline => f.write_str("heading-outline"),
            StrategyKind::Generic => f.write_str("generic"),
        }
    }
}

struct StrategyRule {
    hosts: &'static [&'static str],
    marker: Selector,
    strategy: StrategyKind,
}

impl StrategyRule {
    fn applies(&self, page: &PageSnapshot) -> bool {
        let host = page.host().to_ascii_lowercase();
        if self.hosts.iter().any(|h| host.contains(h)) {
            return true;
        }
        page.matches(&self.marker)
    }
}

/// Ordered first-match rule table. New site layouts are added as rows; the
/// final heading row and the implicit generic default stay last.
static RULES: Lazy<Vec<StrategyRule>> = Lazy::new(|| {
    let mut rules = vec![StrategyRule {
        hosts: CHAT_HOSTS,
        marker: static_selector(ASSISTANT_TURN_SELECTOR),
        strategy: StrategyKind::ChatTranscript,
    }];
    for layout in STRUCTURED_LAYOUTS {
        rules.push(StrategyRule {
            hosts: layout.hosts,
            marker: static_selector(layout.container),
            strategy: StrategyKind::Structured(layout),
        });
    }
    rules.push(StrategyRule {
        hosts: &[],
        marker: static_selector(HEADING_SELECTOR),
        strategy: StrategyKind::HeadingOutline,
    });
    rules
});

/// Picks the strategy for a page. Evaluated fresh on every segmentation
/// pass; the decision is never cached, so a re-parsed document always
/// re-derives its strategy from current signals.
pub fn choose_strategy(page: &PageSnapshot) -> StrategyKind {
    for rule in RULES.iter() {
        if rule.applies(page) {
            return rule.strategy;
        }
    }
    StrategyKind::Generic
}

pub(crate) fn static_selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must compile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chat_host_wins_before_anything_else() {
        let page = PageSnapshot::parse("<h1>t</h1>", "chatgpt.com");
        assert_eq!(choose_strategy(&page), StrategyKind::ChatTranscript);
    }

    #[test]
    fn chat_marker_matches_without_the_host() {
        let page = PageSnapshot::parse(
            "<article data-turn='assistant'>hi</article>",
            "self-hosted.example",
        );
        assert_eq!(choose_strategy(&page), StrategyKind::ChatTranscript);
    }

    #[test]
    fn vendor_hosts_pick_their_layouts() {
        for layout in STRUCTURED_LAYOUTS {
            let page = PageSnapshot::parse("<p>plain</p>", layout.hosts[0]);
            assert_eq!(choose_strategy(&page), StrategyKind::Structured(layout));
        }
    }

    #[test]
    fn headings_beat_generic() {
        let page = PageSnapshot::parse("<h2>Section</h2><p>body</p>", "blog.example");
        assert_eq!(choose_strategy(&page), StrategyKind::HeadingOutline);
    }

    #[test]
    fn plain_prose_falls_through_to_generic() {
        let page = PageSnapshot::parse("<p>just text</p>", "blog.example");
        assert_eq!(choose_strategy(&page), StrategyKind::Generic);
    }

    #[test]
    fn all_registered_markers_compile() {
        assert_eq!(RULES.len(), 2 + STRUCTURED_LAYOUTS.len());
    }
}
