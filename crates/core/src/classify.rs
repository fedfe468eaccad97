//! Filtering and ordering of files found in the extracted upload.
//!
//! Only `.ppt`, `.pptx` and `.pptm` files are accepted. Accepted files are
//! ordered chapter-first (`CH01`, `CH 2`, ...), then by the first number in
//! the name, then alphabetically.

use crate::types::SourceDocument;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

/// Regex for a chapter marker in an upper-cased filename.
static CHAPTER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"CH\s*0*(\d+)").unwrap());

/// Regex for any run of digits.
static DIGITS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"0*(\d+)").unwrap());

/// Number used for names without any digits.
const NO_NUMBER: u64 = 9999;

/// Ordering key for a source document.
///
/// Field order matters: the derived `Ord` compares tier, then number, then
/// the case-folded name, then the original name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    /// 0 = chapter marker, 1 = bare digits, 2 = no number.
    pub tier: u8,

    /// Parsed number (saturating on overflow).
    pub number: u64,

    folded_name: String,

    /// Original filename.
    pub name: String,
}

impl SortKey {
    /// Compute the key for a filename.
    pub fn for_name(name: &str) -> Self {
        let upper = name.to_uppercase();

        // Chapter markers win over bare digits even when both match.
        let (tier, number) = if let Some(caps) = CHAPTER_REGEX.captures(&upper) {
            (0, parse_number(&caps[1]))
        } else if let Some(caps) = DIGITS_REGEX.captures(&upper) {
            (1, parse_number(&caps[1]))
        } else {
            (2, NO_NUMBER)
        };

        Self {
            tier,
            number,
            folded_name: name.to_lowercase(),
            name: name.to_string(),
        }
    }
}

/// Parse a captured digit run; `\d` also matches non-ASCII digits such as `３`.
fn parse_number(digits: &str) -> u64 {
    let ascii: String = digits.nfkc().collect();
    let ascii = ascii.trim_start_matches('0');
    if ascii.is_empty() {
        return 0;
    }
    ascii.parse().unwrap_or(u64::MAX)
}

/// Files found in the extracted upload, split by whether they will be converted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    /// Presentations to convert, in processing order.
    pub accepted: Vec<SourceDocument>,

    /// Every other regular file, relative to the scanned root.
    pub rejected: Vec<PathBuf>,
}

impl Classification {
    /// Split a list of paths into accepted and rejected files.
    ///
    /// Accepted documents are sorted by [`SortKey`], with the full path as a
    /// final tiebreak so the order is total.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut classification = Self::default();

        for path in paths {
            let path = path.into();
            match SourceDocument::from_path(path.clone()) {
                Some(doc) => classification.accepted.push(doc),
                None => classification.rejected.push(path),
            }
        }

        classification
            .accepted
            .sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.path.cmp(&b.path)));
        classification.rejected.sort();

        classification
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Recursively scan `root` and classify every regular file under it.
pub fn classify(root: &Path) -> Classification {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                log::warn!("Error accessing entry: {}", e);
            }
        }
    }

    let mut classification = Classification::from_paths(files);

    // Rejected files are only reported, so show them relative to the upload.
    for path in &mut classification.rejected {
        if let Ok(relative) = path.strip_prefix(root) {
            *path = relative.to_path_buf();
        }
    }

    log::debug!(
        "Classified {}: {} accepted, {} rejected",
        root.display(),
        classification.accepted.len(),
        classification.rejected.len()
    );

    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(classification: &Classification) -> Vec<&str> {
        classification
            .accepted
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }

    #[test]
    fn test_sort_key_tiers() {
        let key = SortKey::for_name("CH01_intro.ppt");
        assert_eq!((key.tier, key.number), (0, 1));

        let key = SortKey::for_name("ch 007 wrap-up.pptx");
        assert_eq!((key.tier, key.number), (0, 7));

        let key = SortKey::for_name("10_summary.pptx");
        assert_eq!((key.tier, key.number), (1, 10));

        let key = SortKey::for_name("week0003.pptm");
        assert_eq!((key.tier, key.number), (1, 3));

        let key = SortKey::for_name("notes.pptx");
        assert_eq!((key.tier, key.number), (2, 9999));
    }

    #[test]
    fn test_chapter_takes_priority_over_leading_digits() {
        let key = SortKey::for_name("99 CH02.pptx");
        assert_eq!((key.tier, key.number), (0, 2));
    }

    #[test]
    fn test_all_zero_digits() {
        let key = SortKey::for_name("CH00.pptx");
        assert_eq!((key.tier, key.number), (0, 0));
    }

    #[test]
    fn test_huge_number_saturates() {
        let key = SortKey::for_name("123456789012345678901234567890.pptx");
        assert_eq!((key.tier, key.number), (1, u64::MAX));
    }

    #[test]
    fn test_fullwidth_digits() {
        let key = SortKey::for_name("CH３.pptx");
        assert_eq!((key.tier, key.number), (0, 3));

        let key = SortKey::for_name("ＣＨ０１２ 강의.pptx");
        assert_eq!((key.tier, key.number), (1, 12));

        let classification = Classification::from_paths(["CH10.pptx", "CH３.pptx"]);
        assert_eq!(names(&classification), vec!["CH３.pptx", "CH10.pptx"]);
    }

    #[test]
    fn test_mixed_order() {
        let classification = Classification::from_paths([
            "ch2.pptx",
            "CH01_intro.ppt",
            "10_summary.pptx",
            "notes.pptx",
        ]);

        assert_eq!(
            names(&classification),
            vec!["CH01_intro.ppt", "ch2.pptx", "10_summary.pptx", "notes.pptx"]
        );
    }

    #[test]
    fn test_ties_break_case_insensitively() {
        let classification =
            Classification::from_paths(["beta.pptx", "Alpha.pptx", "alpha.ppt", "Gamma.pptm"]);

        assert_eq!(
            names(&classification),
            vec!["alpha.ppt", "Alpha.pptx", "beta.pptx", "Gamma.pptm"]
        );
    }

    #[test]
    fn test_same_name_in_different_folders_is_ordered_by_path() {
        let classification = Classification::from_paths(["B/x.pptx", "A/x.pptx"]);
        let paths: Vec<_> = classification.accepted.iter().map(|d| d.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("A/x.pptx"), PathBuf::from("B/x.pptx")]);
    }

    #[test]
    fn test_rejects_other_extensions() {
        let classification = Classification::from_paths([
            "deck.PPTX",
            "readme.txt",
            "slides.pdf",
            "template.potx",
            "archive.ppt.zip",
            "noext",
        ]);

        assert_eq!(names(&classification), vec!["deck.PPTX"]);
        assert_eq!(
            classification.rejected,
            vec![
                PathBuf::from("archive.ppt.zip"),
                PathBuf::from("noext"),
                PathBuf::from("readme.txt"),
                PathBuf::from("slides.pdf"),
                PathBuf::from("template.potx"),
            ]
        );
    }

    #[test]
    fn test_classify_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("part1/deep")).unwrap();
        std::fs::write(root.join("part1/CH02.pptx"), b"x").unwrap();
        std::fs::write(root.join("part1/deep/CH01.ppt"), b"x").unwrap();
        std::fs::write(root.join("readme.txt"), b"x").unwrap();

        let classification = classify(root);

        assert_eq!(names(&classification), vec!["CH01.ppt", "CH02.pptx"]);
        assert_eq!(classification.rejected, vec![PathBuf::from("readme.txt")]);
        assert!(classification.accepted[0].path.starts_with(root));
    }
}
