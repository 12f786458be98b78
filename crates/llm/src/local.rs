pub const CONTEXT_START: &str = "=== CONTEXT START ===";
pub const CONTEXT_END: &str = "=== CONTEXT END ===";

const ANSWER_WORDS: usize = 80;

/// Offline extractive answer: the leading words of the supplied sources, or a
/// scoped help message when the prompt carries no sources.
pub fn synthesize_local_answer(prompt: &str) -> String {
    let context = extract_context_block(prompt, CONTEXT_START, CONTEXT_END);
    let grounded = context
        .lines()
        .any(|line| line.trim_start().starts_with("[SOURCE:"));
    let body = context
        .lines()
        .filter(|line| !line.trim_start().starts_with("[SOURCE:"))
        .collect::<Vec<_>>()
        .join("\n");
    let summary = summarize_text(&body, ANSWER_WORDS);
    if !grounded || summary.is_empty() {
        return "I can help small businesses with registration (Udyam, GST), compliance, \
                employment law, contracts, intellectual property, taxation and access to \
                finance. Please ask a more specific question."
            .to_string();
    }
    format!("Based on the available legal sources: {summary}")
}

fn extract_context_block(text: &str, start_marker: &str, stop_marker: &str) -> String {
    let Some(start_idx) = text.find(start_marker) else {
        return String::new();
    };
    let after = &text[start_idx + start_marker.len()..];
    match after.find(stop_marker) {
        Some(end_idx) => after[..end_idx].trim().to_string(),
        None => after.trim().to_string(),
    }
}

fn summarize_text(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<&str>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_yields_help_message() {
        let prompt = format!("{CONTEXT_START}\n{CONTEXT_END}\nQuestion: hi");
        assert!(synthesize_local_answer(&prompt).contains("Udyam"));
        assert!(synthesize_local_answer("no markers").contains("specific question"));
        let ungrounded = format!("{CONTEXT_START}\nNo retrieved sources.\n{CONTEXT_END}");
        assert!(synthesize_local_answer(&ungrounded).contains("Udyam"));
    }

    #[test]
    fn summary_is_word_capped() {
        let words = vec!["word"; 200].join(" ");
        let prompt = format!("{CONTEXT_START}\n[SOURCE: d, passage p]\n{words}\n{CONTEXT_END}");
        let answer = synthesize_local_answer(&prompt);
        assert_eq!(answer.split_whitespace().count(), ANSWER_WORDS + 5);
    }
}
