//! Token estimation and line-boundary truncation shared by the assembler
//! and history compressor (component J).

/// Rough token estimate: ~0.75 tokens per character, floor of 1 char ≈ 4
/// chars per token.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f32 * 0.75).ceil() as u32
}

const TRUNCATION_MARKER: &str = "... [truncated]";

/// Truncate `text` to fit within `budget` tokens, preferring to cut at a
/// line boundary and appending [`TRUNCATION_MARKER`]. Falls back to word
/// truncation only if even the first line exceeds the budget.
pub fn truncate_to_budget(text: &str, budget: u32) -> String {
    if budget == 0 {
        return String::new();
    }
    if estimate_tokens(text) <= budget {
        return text.to_string();
    }

    let marker_tokens = estimate_tokens(TRUNCATION_MARKER);
    let content_budget = budget.saturating_sub(marker_tokens);
    if content_budget == 0 {
        return TRUNCATION_MARKER.to_string();
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut kept = String::new();
    for line in &lines {
        let candidate = if kept.is_empty() {
            line.to_string()
        } else {
            format!("{kept}\n{line}")
        };
        if estimate_tokens(&candidate) > content_budget {
            break;
        }
        kept = candidate;
    }

    if kept.is_empty() {
        // Even the first line overflows the budget; fall back to word
        // truncation of that line.
        let first_line = lines.first().copied().unwrap_or(text);
        kept = truncate_to_word_budget(first_line, content_budget);
    }

    format!("{kept}\n{TRUNCATION_MARKER}")
}

fn truncate_to_word_budget(text: &str, budget: u32) -> String {
    let mut kept = String::new();
    for word in text.split_whitespace() {
        let candidate = if kept.is_empty() {
            word.to_string()
        } else {
            format!("{kept} {word}")
        };
        if estimate_tokens(&candidate) > budget {
            break;
        }
        kept = candidate;
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_within_budget_is_unchanged() {
        let text = "short text";
        assert_eq!(truncate_to_budget(text, 100), text);
    }

    #[test]
    fn truncates_at_line_boundary() {
        let text = "line one\nline two\nline three\nline four\nline five";
        let truncated = truncate_to_budget(text, 10);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(estimate_tokens(&truncated) <= 10 + estimate_tokens(TRUNCATION_MARKER) + 2);
    }

    #[test]
    fn zero_budget_is_empty() {
        assert_eq!(truncate_to_budget("anything", 0), "");
    }

    #[test]
    fn falls_back_to_word_truncation_for_oversized_first_line() {
        let text = "a very long single line with no newlines that exceeds the budget by itself entirely";
        let truncated = truncate_to_budget(text, 5);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(!truncated.contains('\n') || truncated.matches('\n').count() == 1);
    }
}
