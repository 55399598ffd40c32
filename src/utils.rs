//! Small text helpers shared across the pipeline stages.

/// Largest index `<= idx` that falls on a UTF-8 character boundary.
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest index `>= idx` that falls on a UTF-8 character boundary.
pub fn ceil_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Slice of `text` extending `radius` bytes on each side of the
/// `[start, end)` span, clamped to character boundaries.
///
/// Returns the window and its byte offset into `text`, so match positions
/// inside the window can be mapped back to document coordinates.
pub fn window_around(text: &str, start: usize, end: usize, radius: usize) -> (&str, usize) {
    let lo = floor_char_boundary(text, start.saturating_sub(radius));
    let hi = ceil_char_boundary(text, end.saturating_add(radius).min(text.len()));
    (&text[lo..hi], lo)
}

/// Heuristic for a free-text security name line: mostly alphabetic words,
/// the majority starting with an uppercase letter.
pub fn is_title_cased(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 3 || trimmed.len() > 80 {
        return false;
    }
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let alpha_words = words
        .iter()
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .count();
    if alpha_words == 0 || alpha_words * 2 < words.len() {
        return false;
    }

    let upper_starts = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
        .count();

    trimmed
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() && c.is_uppercase())
        && upper_starts * 2 >= words.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_to_char_boundaries() {
        let text = "préfix ISIN suffix";
        for start in 0..text.len() {
            let (window, offset) = window_around(text, start, start + 1, 3);
            assert!(offset <= start || offset == text.len());
            assert!(!window.is_empty() || text.is_empty());
        }
    }

    #[test]
    fn test_window_offsets_map_back() {
        let text = "aaaa TARGET bbbb";
        let start = text.find("TARGET").unwrap();
        let (window, offset) = window_around(text, start, start + 6, 5);
        let local = window.find("TARGET").unwrap();
        assert_eq!(offset + local, start);
    }

    #[test]
    fn test_title_case_detection() {
        assert!(is_title_cased("Microsoft Corporation"));
        assert!(is_title_cased("Nestlé SA Registered Shares"));
        assert!(!is_title_cased("quantity: 100 shares"));
        assert!(!is_title_cased("1.000,00"));
        assert!(!is_title_cased(""));
        assert!(!is_title_cased("x"));
    }
}
