/// Lowercase and trim a user message before keyword matching.
pub fn normalize_message(text: &str) -> String {
    text.trim().to_lowercase()
}

/// True when `haystack` contains any of `needles` as a substring.
pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Whitespace-separated words longer than three characters.
///
/// Length is counted in chars so that non-ASCII words are not over-counted.
pub fn content_words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect()
}

/// Split text into paragraphs on blank lines, dropping short fragments.
pub fn paragraphs(text: &str, min_len: usize) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in normalized.lines() {
        if line.trim().is_empty() {
            push_paragraph(&mut out, &mut current, min_len);
        } else {
            current.push(line.trim());
        }
    }
    push_paragraph(&mut out, &mut current, min_len);
    out
}

fn push_paragraph(out: &mut Vec<String>, current: &mut Vec<&str>, min_len: usize) {
    if current.is_empty() {
        return;
    }
    let joined = current.join(" ");
    current.clear();
    if joined.chars().count() > min_len {
        out.push(joined);
    }
}
