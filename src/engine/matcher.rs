//! Anchor matching: which lines a line operation targets.

use crate::engine::errors::PatchError;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

/// A regular expression tested against individual lines.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, PatchError> {
        let regex = Regex::new(pattern).map_err(|source| PatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// Pattern matching `text` literally.
    pub fn literal(text: &str) -> Result<Self, PatchError> {
        Self::new(&regex::escape(text))
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Ascending indices of the lines this pattern matches.
    pub fn matching_lines(&self, lines: &[String]) -> Vec<usize> {
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.is_match(line))
            .map(|(index, _)| index)
            .collect()
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self { regex }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.regex.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for Pattern {}

/// Window over the list of matched anchors.
///
/// `start` is 1-based into the match list; negative values count from the
/// end (`-1` is the last match). Without `start` every match is targeted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Occurrence {
    pub start: Option<i64>,
    pub count: Option<usize>,
}

impl Occurrence {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn nth(start: i64) -> Self {
        Self {
            start: Some(start),
            count: None,
        }
    }

    pub fn window(start: i64, count: usize) -> Self {
        Self {
            start: Some(start),
            count: Some(count),
        }
    }

    pub fn select<'a>(&self, matches: &'a [usize]) -> &'a [usize] {
        let Some(start) = self.start else {
            return matches;
        };

        let len = matches.len() as i64;
        let first = match start {
            0 => return &[],
            s if s > 0 => s - 1,
            s => len + s,
        };
        if first < 0 || first >= len {
            return &[];
        }

        let first = first as usize;
        let end = first
            .saturating_add(self.count.unwrap_or(1))
            .min(matches.len());
        &matches[first..end]
    }
}

/// Block of lines relative to an anchor: `count` lines starting at
/// `anchor + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub offset: i64,
    pub count: usize,
}

impl LineSpan {
    pub fn new(offset: i64, count: usize) -> Self {
        Self { offset, count }
    }

    /// Line indices covered around `anchor`, clamped to `0..total`.
    pub fn around(&self, anchor: usize, total: usize) -> std::ops::Range<usize> {
        let begin = (anchor as i64).saturating_add(self.offset);
        let end = begin.saturating_add(self.count as i64);
        let clamp = |value: i64| value.clamp(0, total as i64) as usize;
        clamp(begin)..clamp(end)
    }
}

/// Union of all line indices to remove, in ascending order.
pub fn removal_set(anchors: &[usize], span: Option<LineSpan>, total: usize) -> BTreeSet<usize> {
    match span {
        None => anchors.iter().copied().filter(|&i| i < total).collect(),
        Some(span) => anchors
            .iter()
            .flat_map(|&anchor| span.around(anchor, total))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matching_lines_in_order() {
        let pattern = Pattern::new(r"^use ").unwrap();
        let content = lines(&["use a;", "fn main() {}", "use b;"]);
        assert_eq!(pattern.matching_lines(&content), vec![0, 2]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("(unclosed").unwrap_err();
        assert!(matches!(err, PatchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let pattern = Pattern::literal("parent::version($request)").unwrap();
        assert!(pattern.is_match("    return parent::version($request);"));
        assert!(!pattern.is_match("parent::versionX$request)"));
    }

    #[test]
    fn test_occurrence_positive_start() {
        let matches = [2, 5, 9];
        assert_eq!(Occurrence::window(2, 1).select(&matches), &[5]);
        assert_eq!(Occurrence::window(1, 2).select(&matches), &[2, 5]);
        assert_eq!(Occurrence::nth(3).select(&matches), &[9]);
    }

    #[test]
    fn test_occurrence_negative_start() {
        let matches = [2, 5, 9];
        assert_eq!(Occurrence::window(-1, 1).select(&matches), &[9]);
        assert_eq!(Occurrence::window(-2, 5).select(&matches), &[5, 9]);
        assert!(Occurrence::nth(-4).select(&matches).is_empty());
    }

    #[test]
    fn test_occurrence_out_of_range_and_zero() {
        let matches = [2, 5, 9];
        assert!(Occurrence::nth(4).select(&matches).is_empty());
        assert!(Occurrence::nth(0).select(&matches).is_empty());
        assert!(Occurrence::nth(1).select(&[]).is_empty());
    }

    #[test]
    fn test_occurrence_count_without_start_targets_all() {
        let occurrence = Occurrence {
            start: None,
            count: Some(1),
        };
        assert_eq!(occurrence.select(&[1, 2, 3]), &[1, 2, 3]);
    }

    #[test]
    fn test_span_clamps_to_content() {
        assert_eq!(LineSpan::new(-1, 4).around(0, 10), 0..3);
        assert_eq!(LineSpan::new(1, 1).around(3, 10), 4..5);
        assert_eq!(LineSpan::new(0, 5).around(8, 10), 8..10);
    }

    #[test]
    fn test_span_extreme_offsets_saturate() {
        assert_eq!(LineSpan::new(i64::MAX, 1).around(1, 2), 2..2);
        assert_eq!(LineSpan::new(i64::MIN, 1).around(1, 2), 0..0);
    }

    #[test]
    fn test_overlapping_spans_remove_each_line_once() {
        let set = removal_set(&[2, 3], Some(LineSpan::new(0, 2)), 10);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }
}
