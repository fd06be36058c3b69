//! Raw content diff: unified-style hunks with surrounding context.
//!
//! Used when two versions cannot be interpreted through a structured
//! format. Built on `similar`'s Myers line diff.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// Context lines kept around each change.
pub const DEFAULT_CONTEXT: usize = 3;

/// Hunks describing how one blob becomes another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDiff {
    pub hunks: Vec<DiffHunk>,
    pub old_lines: usize,
    pub new_lines: usize,
    /// Set when either side is not UTF-8; hunks then hold a size summary.
    pub binary: bool,
}

impl BlobDiff {
    /// Returns `true` if the two blobs are identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.lines().filter(|l| matches!(l, DiffLine::Added(_))).count()
    }

    pub fn deletions(&self) -> usize {
        self.lines().filter(|l| matches!(l, DiffLine::Removed(_))).count()
    }

    fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| &h.lines)
    }

    /// Render as unified diff text (`@@ -a,b +c,d @@` headers).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for hunk in &self.hunks {
            let _ = writeln!(
                out,
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            );
            for line in &hunk.lines {
                let (marker, text) = match line {
                    DiffLine::Context(t) => (' ', t),
                    DiffLine::Added(t) => ('+', t),
                    DiffLine::Removed(t) => ('-', t),
                };
                let _ = writeln!(out, "{marker}{text}");
            }
        }
        out
    }
}

/// A contiguous region of changes plus context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// 1-based first line in the old content.
    pub old_start: usize,
    pub old_count: usize,
    /// 1-based first line in the new content.
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum DiffLine {
    Context(String),
    Added(String),
    Removed(String),
}

/// Diff two blobs line by line, keeping `context` lines around changes.
///
/// Content that is not UTF-8 on either side produces a single summary hunk
/// with `binary` set.
pub fn diff_blobs(old: &[u8], new: &[u8], context: usize) -> BlobDiff {
    let (Ok(old_str), Ok(new_str)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return binary_diff(old, new);
    };

    let old_lines = old_str.lines().count();
    let new_lines = new_str.lines().count();
    if old_str == new_str {
        return BlobDiff {
            hunks: Vec::new(),
            old_lines,
            new_lines,
            binary: false,
        };
    }

    let text_diff = TextDiff::from_lines(old_str, new_str);
    let hunks = text_diff
        .grouped_ops(context)
        .iter()
        .filter_map(|group| {
            let first = group.first()?;
            let mut hunk = DiffHunk {
                old_start: first.old_range().start + 1,
                old_count: 0,
                new_start: first.new_range().start + 1,
                new_count: 0,
                lines: Vec::new(),
            };
            for op in group {
                for change in text_diff.iter_changes(op) {
                    let text = change.value().trim_end_matches(['\n', '\r']).to_string();
                    match change.tag() {
                        ChangeTag::Equal => {
                            hunk.old_count += 1;
                            hunk.new_count += 1;
                            hunk.lines.push(DiffLine::Context(text));
                        }
                        ChangeTag::Delete => {
                            hunk.old_count += 1;
                            hunk.lines.push(DiffLine::Removed(text));
                        }
                        ChangeTag::Insert => {
                            hunk.new_count += 1;
                            hunk.lines.push(DiffLine::Added(text));
                        }
                    }
                }
            }
            Some(hunk)
        })
        .collect();

    BlobDiff {
        hunks,
        old_lines,
        new_lines,
        binary: false,
    }
}

fn binary_diff(old: &[u8], new: &[u8]) -> BlobDiff {
    if old == new {
        return BlobDiff {
            hunks: Vec::new(),
            old_lines: 0,
            new_lines: 0,
            binary: true,
        };
    }
    let mut lines = Vec::new();
    if !old.is_empty() {
        lines.push(DiffLine::Removed(format!("(binary content, {} bytes)", old.len())));
    }
    if !new.is_empty() {
        lines.push(DiffLine::Added(format!("(binary content, {} bytes)", new.len())));
    }
    BlobDiff {
        hunks: vec![DiffHunk {
            old_start: 1,
            old_count: usize::from(!old.is_empty()),
            new_start: 1,
            new_count: usize::from(!new.is_empty()),
            lines,
        }],
        old_lines: 0,
        new_lines: 0,
        binary: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_blobs_no_diff() {
        let diff = diff_blobs(b"hello\nworld\n", b"hello\nworld\n", DEFAULT_CONTEXT);
        assert!(diff.is_empty());
        assert_eq!(diff.old_lines, 2);
        assert_eq!(diff.render(), "");
    }

    #[test]
    fn appended_row() {
        let diff = diff_blobs(b"id,name\n1,John\n", b"id,name\n1,John\n2,Jane\n", DEFAULT_CONTEXT);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.deletions(), 0);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(
            diff.render(),
            "@@ -1,2 +1,3 @@\n id,name\n 1,John\n+2,Jane\n"
        );
    }

    #[test]
    fn modification_shows_remove_and_add() {
        let diff = diff_blobs(b"hello world\n", b"hello universe\n", DEFAULT_CONTEXT);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.deletions(), 1);
    }

    #[test]
    fn context_is_bounded() {
        let old = b"a\nb\nc\nd\ne\nf\ng\nh\ni\nj\n";
        let new = b"a\nb\nc\nd\nX\nf\ng\nh\ni\nj\n";
        let diff = diff_blobs(old, new, 1);
        let hunk = &diff.hunks[0];
        assert_eq!(hunk.old_start, 4);
        assert_eq!(hunk.old_count, 3);
        assert_eq!(
            hunk.lines,
            vec![
                DiffLine::Context("d".into()),
                DiffLine::Removed("e".into()),
                DiffLine::Added("X".into()),
                DiffLine::Context("f".into()),
            ]
        );
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let old: String = (0..30).map(|i| format!("line{i}\n")).collect();
        let new = old.replace("line2\n", "two\n").replace("line27\n", "twenty-seven\n");
        let diff = diff_blobs(old.as_bytes(), new.as_bytes(), DEFAULT_CONTEXT);
        assert_eq!(diff.hunks.len(), 2);
    }

    #[test]
    fn empty_to_content() {
        let diff = diff_blobs(b"", b"new content\n", DEFAULT_CONTEXT);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.hunks[0].old_count, 0);
    }

    #[test]
    fn binary_content_detection() {
        let diff = diff_blobs(&[0u8, 0xFF, 0xFE], &[1u8, 0xFF], DEFAULT_CONTEXT);
        assert!(diff.binary);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.hunks[0].lines.len(), 2);
    }

    #[test]
    fn identical_binary_is_empty() {
        let diff = diff_blobs(&[0xFF, 0xFE], &[0xFF, 0xFE], DEFAULT_CONTEXT);
        assert!(diff.binary);
        assert!(diff.is_empty());
    }
}
