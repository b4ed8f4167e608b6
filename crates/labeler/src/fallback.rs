use unicode_segmentation::UnicodeSegmentation;

/// Upper bound on fallback label length, in grapheme clusters.
pub const FALLBACK_CHAR_BUDGET: usize = 24;

/// Label substituted when nothing readable survives the heuristic.
pub const FALLBACK_DEFAULT_LABEL: &str = "Untitled";

/// Sentence-ending punctuation in the two scripts the heuristic covers.
const SENTENCE_ENDINGS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// Deterministic local label for a chunk of text.
///
/// Takes the first sentence (delimiter included), truncates it to the
/// grapheme budget, removes all whitespace, and substitutes a fixed default
/// if the result is empty. Whitespace removal rather than trimming keeps
/// CJK titles compact and never hurts the delimiter-terminated form.
pub fn fallback_label(text: &str) -> String {
    let trimmed = text.trim();
    let first_sentence = match trimmed.find(SENTENCE_ENDINGS) {
        Some(pos) => {
            let delimiter_len = trimmed[pos..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            &trimmed[..pos + delimiter_len]
        }
        None => trimmed,
    };

    let budgeted: String = first_sentence
        .graphemes(true)
        .take(FALLBACK_CHAR_BUDGET)
        .collect();
    let label: String = budgeted.chars().filter(|ch| !ch.is_whitespace()).collect();

    if label.is_empty() {
        FALLBACK_DEFAULT_LABEL.to_string()
    } else {
        label
    }
}
