//! Output filenames for converted documents.

/// Characters that are not allowed in output filenames on any platform.
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum length of a sanitized stem, in characters.
const MAX_STEM_CHARS: usize = 80;

/// Stem used when sanitizing leaves nothing behind.
const FALLBACK_STEM: &str = "presentation";

/// Make a filename stem safe for the output directory.
///
/// Removes characters that filesystems reject, trims whitespace, truncates to
/// 80 characters and substitutes a fallback when nothing is left.
pub fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect();

    let truncated: String = cleaned.trim().chars().take(MAX_STEM_CHARS).collect();
    let truncated = truncated.trim_end();

    if truncated.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        truncated.to_string()
    }
}

/// Final PDF name for the document at 1-based `index`.
///
/// The index prefix keeps names unique even when two sources share a stem.
pub fn output_name(index: usize, stem: &str) -> String {
    format!("{:02}_{}.pdf", index, sanitize_stem(stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_unsafe_chars() {
        assert_eq!(sanitize_stem(r#"a\b/c:d*e?f"g<h>i|j"#), "abcdefghij");
    }

    #[test]
    fn test_sanitize_trims_whitespace() {
        assert_eq!(sanitize_stem("  Week 1 Review \t"), "Week 1 Review");
    }

    #[test]
    fn test_sanitize_truncates_by_chars() {
        let long = "가".repeat(100);
        let sanitized = sanitize_stem(&long);
        assert_eq!(sanitized.chars().count(), 80);
    }

    #[test]
    fn test_sanitize_fallback() {
        assert_eq!(sanitize_stem(""), "presentation");
        assert_eq!(sanitize_stem("  "), "presentation");
        assert_eq!(sanitize_stem("???"), "presentation");
    }

    #[test]
    fn test_output_name_padding() {
        assert_eq!(output_name(1, "CH01"), "01_CH01.pdf");
        assert_eq!(output_name(12, "Intro: Part 2"), "12_Intro Part 2.pdf");
        assert_eq!(output_name(105, "deck"), "105_deck.pdf");
    }

    #[test]
    fn test_shared_stems_stay_unique() {
        assert_eq!(output_name(3, "x"), "03_x.pdf");
        assert_eq!(output_name(7, "x"), "07_x.pdf");
    }
}
