use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp};

/// How a run of lines relates the old text to the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Equal,
    Added,
    Removed,
}

impl ChangeKind {
    /// Prefix used by [`StructuralDiff::render_unified`].
    pub fn marker(self) -> char {
        match self {
            ChangeKind::Equal => ' ',
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        }
    }
}

/// A maximal run of consecutive lines sharing one [`ChangeKind`].
///
/// Lines are stored without their `\n` terminator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSegment {
    pub kind: ChangeKind,
    pub lines: Vec<String>,
}

impl ChangeSegment {
    pub fn new(kind: ChangeKind, lines: Vec<String>) -> Self {
        Self { kind, lines }
    }
}

/// Ordered change list between two texts.
///
/// Reading the `Equal` and `Removed` segments in order reproduces the old
/// text; reading the `Equal` and `Added` segments reproduces the new one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralDiff {
    segments: Vec<ChangeSegment>,
}

impl StructuralDiff {
    pub fn segments(&self) -> &[ChangeSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<ChangeSegment> {
        self.segments
    }

    /// True when the only segment is `Equal`.
    pub fn is_unchanged(&self) -> bool {
        self.segments.iter().all(|s| s.kind == ChangeKind::Equal)
    }

    /// Number of added lines.
    pub fn additions(&self) -> usize {
        self.count(ChangeKind::Added)
    }

    /// Number of removed lines.
    pub fn removals(&self) -> usize {
        self.count(ChangeKind::Removed)
    }

    fn count(&self, kind: ChangeKind) -> usize {
        self.segments
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.lines.len())
            .sum()
    }

    /// Rebuild the old text (newline-terminated lines).
    pub fn old_text(&self) -> String {
        self.side_text(ChangeKind::Removed)
    }

    /// Rebuild the new text (newline-terminated lines).
    pub fn new_text(&self) -> String {
        self.side_text(ChangeKind::Added)
    }

    fn side_text(&self, changed: ChangeKind) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            if segment.kind == ChangeKind::Equal || segment.kind == changed {
                for line in &segment.lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Every line prefixed with `+`, `-` or a space.
    pub fn render_unified(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            for line in &segment.lines {
                out.push(segment.kind.marker());
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Diff two texts line by line.
///
/// Identical inputs yield exactly one `Equal` segment covering the whole
/// text, even when the text is empty. Within each changed region removed
/// lines are reported before added ones.
///
/// ```
/// use ichnaea_diff::{diff_texts, ChangeKind};
///
/// let diff = diff_texts("id,name\n1,John\n", "id,name\n1,John\n2,Jane\n");
/// let kinds: Vec<_> = diff.segments().iter().map(|s| s.kind).collect();
/// assert_eq!(kinds, vec![ChangeKind::Equal, ChangeKind::Added]);
/// assert_eq!(diff.segments()[1].lines, vec!["2,Jane"]);
/// ```
pub fn diff_texts(old: &str, new: &str) -> StructuralDiff {
    let old_lines: Vec<&str> = old.split_terminator('\n').collect();
    let new_lines: Vec<&str> = new.split_terminator('\n').collect();

    if old_lines == new_lines {
        return StructuralDiff {
            segments: vec![ChangeSegment::new(ChangeKind::Equal, owned(&old_lines))],
        };
    }

    let mut builder = SegmentBuilder::default();
    for op in similar::capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
        match op {
            DiffOp::Equal { old_index, len, .. } => {
                builder.push(ChangeKind::Equal, &old_lines[old_index..old_index + len]);
            }
            DiffOp::Delete { old_index, old_len, .. } => {
                builder.push(ChangeKind::Removed, &old_lines[old_index..old_index + old_len]);
            }
            DiffOp::Insert { new_index, new_len, .. } => {
                builder.push(ChangeKind::Added, &new_lines[new_index..new_index + new_len]);
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                builder.push(ChangeKind::Removed, &old_lines[old_index..old_index + old_len]);
                builder.push(ChangeKind::Added, &new_lines[new_index..new_index + new_len]);
            }
        }
    }
    builder.finish()
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

/// Collects runs, merging adjacent same-kind lines and keeping each changed
/// region as one `Removed` run followed by one `Added` run.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<ChangeSegment>,
    removed: Vec<String>,
    added: Vec<String>,
}

impl SegmentBuilder {
    fn push(&mut self, kind: ChangeKind, lines: &[&str]) {
        if lines.is_empty() {
            return;
        }
        match kind {
            ChangeKind::Removed => self.removed.extend(owned(lines)),
            ChangeKind::Added => self.added.extend(owned(lines)),
            ChangeKind::Equal => {
                self.flush_changes();
                match self.segments.last_mut() {
                    Some(last) if last.kind == ChangeKind::Equal => {
                        last.lines.extend(owned(lines))
                    }
                    _ => self
                        .segments
                        .push(ChangeSegment::new(ChangeKind::Equal, owned(lines))),
                }
            }
        }
    }

    fn flush_changes(&mut self) {
        if !self.removed.is_empty() {
            let lines = std::mem::take(&mut self.removed);
            self.segments.push(ChangeSegment::new(ChangeKind::Removed, lines));
        }
        if !self.added.is_empty() {
            let lines = std::mem::take(&mut self.added);
            self.segments.push(ChangeSegment::new(ChangeKind::Added, lines));
        }
    }

    fn finish(mut self) -> StructuralDiff {
        self.flush_changes();
        StructuralDiff {
            segments: self.segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(diff: &StructuralDiff) -> Vec<ChangeKind> {
        diff.segments().iter().map(|s| s.kind).collect()
    }

    #[test]
    fn identical_texts_yield_single_equal_segment() {
        let text = "id,name\n1,John\n";
        let diff = diff_texts(text, text);
        assert_eq!(
            diff.segments(),
            &[ChangeSegment::new(
                ChangeKind::Equal,
                vec!["id,name".into(), "1,John".into()]
            )]
        );
        assert!(diff.is_unchanged());
    }

    #[test]
    fn empty_texts_yield_one_empty_equal_segment() {
        let diff = diff_texts("", "");
        assert_eq!(diff.segments(), &[ChangeSegment::new(ChangeKind::Equal, vec![])]);
        assert_eq!(diff.old_text(), "");
    }

    #[test]
    fn appended_row_is_one_added_segment() {
        let diff = diff_texts("id,name\n1,John\n", "id,name\n1,John\n2,Jane\n");
        assert_eq!(kinds(&diff), vec![ChangeKind::Equal, ChangeKind::Added]);
        assert_eq!(diff.segments()[1].lines, vec!["2,Jane"]);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.removals(), 0);
    }

    #[test]
    fn appended_member_keeps_predecessor_equal() {
        let old = "{\n  \"a\": 1\n}\n";
        let new = "{\n  \"a\": 1\n  \"b\": 2\n}\n";
        let diff = diff_texts(old, new);
        assert_eq!(
            kinds(&diff),
            vec![ChangeKind::Equal, ChangeKind::Added, ChangeKind::Equal]
        );
        assert_eq!(diff.segments()[0].lines, vec!["{", "  \"a\": 1"]);
        assert_eq!(diff.segments()[1].lines, vec!["  \"b\": 2"]);
    }

    #[test]
    fn replacement_renders_removed_before_added() {
        let diff = diff_texts("a\nold\nc\n", "a\nnew\nc\n");
        assert_eq!(
            kinds(&diff),
            vec![
                ChangeKind::Equal,
                ChangeKind::Removed,
                ChangeKind::Added,
                ChangeKind::Equal
            ]
        );
    }

    #[test]
    fn everything_removed() {
        let diff = diff_texts("x\ny\n", "");
        assert_eq!(kinds(&diff), vec![ChangeKind::Removed]);
        assert_eq!(diff.new_text(), "");
    }

    #[test]
    fn unified_rendering() {
        let diff = diff_texts("a\nb\n", "a\nc\n");
        assert_eq!(diff.render_unified(), " a\n-b\n+c\n");
    }

    #[test]
    fn serializes_as_segment_list() {
        let diff = diff_texts("a\n", "a\nb\n");
        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"kind": "equal", "lines": ["a"]},
                {"kind": "added", "lines": ["b"]}
            ])
        );
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(prop_oneof!["a", "b", "c", "d", ""], 0..20).prop_map(|lines| {
            lines.iter().map(|l| format!("{l}\n")).collect::<String>()
        })
    }

    proptest! {
        #[test]
        fn reconstruction_law(old in text_strategy(), new in text_strategy()) {
            let diff = diff_texts(&old, &new);
            prop_assert_eq!(diff.old_text(), old);
            prop_assert_eq!(diff.new_text(), new);
        }

        #[test]
        fn segments_are_maximal_and_ordered(old in text_strategy(), new in text_strategy()) {
            let diff = diff_texts(&old, &new);
            for pair in diff.segments().windows(2) {
                prop_assert_ne!(pair[0].kind, pair[1].kind);
                prop_assert!(!(pair[0].kind == ChangeKind::Added && pair[1].kind == ChangeKind::Removed));
            }
            for segment in diff.segments() {
                prop_assert!(!segment.lines.is_empty() || diff.segments().len() == 1);
            }
        }

        #[test]
        fn self_diff_is_single_equal(text in text_strategy()) {
            let diff = diff_texts(&text, &text);
            prop_assert_eq!(diff.segments().len(), 1);
            prop_assert_eq!(diff.segments()[0].kind, ChangeKind::Equal);
        }
    }
}
