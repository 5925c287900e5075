//! Combined-source bookkeeping across multiple origins.
//!
//! A [`SourceMap`] stitches any number of source origins (files, editor
//! buffers, spliced `include` content) into one combined string for parsing,
//! while keeping enough per-segment bookkeeping to map any combined offset
//! back to the exact `(origin, line, column)` it came from.

use crate::ast::Position;
use crate::error::OutOfRange;

/// A contiguous run of combined text contributed by a single origin.
///
/// Splicing can split an origin's content into several segments; each split
/// segment remembers where in the origin it starts so locations stay exact.
#[derive(Debug, Clone)]
pub struct SourceSegment {
    /// Identifier of the source origin (file path, `"<string>"`, …).
    pub origin: String,
    /// The text this segment contributes to the combined string.
    pub content: String,
    /// Offset in the combined string where this segment starts.
    pub combined_start: usize,
    /// Byte offset within the origin's full text where `content` begins.
    origin_start: usize,
    /// Line number (1-indexed) of the first character of `content`.
    start_line: usize,
    /// Column number (1-indexed) of the first character of `content`.
    start_column: usize,
    /// Offsets into `content` where each line begins (always starts with 0).
    line_starts: Vec<usize>,
}

impl SourceSegment {
    fn new(
        origin: String,
        content: String,
        combined_start: usize,
        origin_start: usize,
        start_line: usize,
        start_column: usize,
    ) -> Self {
        let line_starts = compute_line_starts(&content);
        Self {
            origin,
            content,
            combined_start,
            origin_start,
            start_line,
            start_column,
            line_starts,
        }
    }

    fn combined_end(&self) -> usize {
        self.combined_start + self.content.len()
    }

    /// Resolve an offset within this segment's content to an origin position.
    fn location_at(&self, offset_in_segment: usize) -> Position {
        let offset = offset_in_segment.min(self.content.len());
        // line_starts is non-empty and starts with 0, so partition_point >= 1
        let line_idx = self.line_starts.partition_point(|&s| s <= offset) - 1;
        let (line, column) = if line_idx == 0 {
            (self.start_line, self.start_column + offset)
        } else {
            (
                self.start_line + line_idx,
                offset - self.line_starts[line_idx] + 1,
            )
        };
        Position::new(
            self.origin.clone(),
            self.origin_start + offset,
            line,
            column,
        )
    }
}

fn compute_line_starts(content: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Maps positions in a combined source string back to original locations.
///
/// Invariant: segments are kept sorted by `combined_start` and never overlap;
/// concatenating them (with gaps padded by spaces) yields the combined
/// string.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    segments: Vec<SourceSegment>,
    combined: String,
}

impl SourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source origin's content to the map.
    ///
    /// With `insert_at = None` the content is appended after all existing
    /// segments. With `insert_at = Some(p)` it is spliced in at combined
    /// offset `p`: a segment covering `p` is split and everything at or after
    /// `p` shifts right by the content length. Splicing beyond the current
    /// end leaves a space-padded gap.
    ///
    /// Returns the combined offset where the content was placed.
    pub fn add_origin(
        &mut self,
        origin: impl Into<String>,
        content: &str,
        insert_at: Option<usize>,
    ) -> usize {
        let insert_at = insert_at.unwrap_or_else(|| self.combined_len());
        self.split_at(insert_at);

        let len = content.len();
        for segment in &mut self.segments {
            if segment.combined_start >= insert_at {
                segment.combined_start += len;
            }
        }

        let segment = SourceSegment::new(origin.into(), content.to_string(), insert_at, 0, 1, 1);
        let idx = self
            .segments
            .partition_point(|s| s.combined_start <= insert_at);
        self.segments.insert(idx, segment);
        self.rebuild();
        insert_at
    }

    /// Overwrite `len` bytes starting at `start` with spaces, in place.
    ///
    /// Offsets and segment boundaries are unchanged; this is how expanded
    /// `include` directives are erased so the combined string still parses.
    pub fn blank_range(&mut self, start: usize, len: usize) {
        let end = start + len;
        for segment in &mut self.segments {
            let seg_start = segment.combined_start;
            let seg_end = segment.combined_end();
            if seg_start >= end || seg_end <= start {
                continue;
            }
            let from = start.max(seg_start) - seg_start;
            let to = end.min(seg_end) - seg_start;
            // Newlines must survive blanking or line counts would drift.
            let blanked: String = segment.content[from..to]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect();
            segment.content.replace_range(from..to, &blanked);
        }
        self.rebuild();
    }

    /// The stitched source string.
    #[must_use]
    pub fn combined(&self) -> &str {
        &self.combined
    }

    /// Total length of the combined string.
    #[must_use]
    pub fn combined_len(&self) -> usize {
        self.segments
            .iter()
            .map(SourceSegment::combined_end)
            .max()
            .unwrap_or(0)
    }

    /// Resolve a combined offset to its origin location.
    ///
    /// # Errors
    /// Returns [`OutOfRange`] if the offset falls in a padding gap between
    /// segments or beyond the combined length.
    pub fn location(&self, offset: usize) -> Result<Position, OutOfRange> {
        let idx = self
            .segments
            .partition_point(|s| s.combined_start <= offset);
        if idx == 0 {
            return Err(OutOfRange { offset });
        }
        let segment = &self.segments[idx - 1];
        if offset >= segment.combined_end() {
            return Err(OutOfRange { offset });
        }
        Ok(segment.location_at(offset - segment.combined_start))
    }

    /// All segments, ordered by `combined_start`. Debug view.
    #[must_use]
    pub fn segments(&self) -> &[SourceSegment] {
        &self.segments
    }

    /// Split the segment covering `offset` (if any) so that `offset` becomes
    /// a segment boundary.
    fn split_at(&mut self, offset: usize) {
        let Some(idx) = self.segments.iter().position(|s| {
            s.combined_start < offset && offset < s.combined_end()
        }) else {
            return;
        };
        let segment = &mut self.segments[idx];
        let k = offset - segment.combined_start;
        let tail_content = segment.content.split_off(k);

        // Origin line/column of the split point, derived from the head.
        let head = &segment.content;
        let (tail_line, tail_column) = match head.rfind('\n') {
            Some(last_nl) => (
                segment.start_line + head.bytes().filter(|&b| b == b'\n').count(),
                k - last_nl,
            ),
            None => (segment.start_line, segment.start_column + k),
        };
        let tail = SourceSegment::new(
            segment.origin.clone(),
            tail_content,
            offset,
            segment.origin_start + k,
            tail_line,
            tail_column,
        );
        segment.line_starts = compute_line_starts(&segment.content);
        self.segments.insert(idx + 1, tail);
    }

    fn rebuild(&mut self) {
        self.segments.retain(|s| !s.content.is_empty());
        self.segments.sort_by_key(|s| s.combined_start);
        let mut combined = String::with_capacity(self.combined_len());
        for segment in &self.segments {
            if segment.combined_start > combined.len() {
                combined.extend(std::iter::repeat_n(' ', segment.combined_start - combined.len()));
            }
            combined.push_str(&segment.content);
        }
        self.combined = combined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_origin() {
        let mut map = SourceMap::new();
        map.add_origin("main.scad", "x = 5;\ny = 10;\n", None);
        assert_eq!(map.combined(), "x = 5;\ny = 10;\n");

        let loc = map.location(0).unwrap();
        assert_eq!(loc.origin, "main.scad");
        assert_eq!((loc.line, loc.column), (1, 1));

        // `y` is at offset 7, line 2 column 1
        let loc = map.location(7).unwrap();
        assert_eq!((loc.line, loc.column), (2, 1));

        // `10` starts at offset 11, line 2 column 5
        let loc = map.location(11).unwrap();
        assert_eq!((loc.line, loc.column), (2, 5));
        assert_eq!(loc.offset, 11);
    }

    #[test]
    fn test_append_second_origin() {
        let mut map = SourceMap::new();
        map.add_origin("a.scad", "a = 1;\n", None);
        let start = map.add_origin("b.scad", "b = 2;\n", None);
        assert_eq!(start, 7);
        assert_eq!(map.combined(), "a = 1;\nb = 2;\n");

        let loc = map.location(7).unwrap();
        assert_eq!(loc.origin, "b.scad");
        assert_eq!((loc.line, loc.column), (1, 1));
        assert_eq!(loc.offset, 0);
    }

    #[test]
    fn test_splice_splits_segment() {
        let mut map = SourceMap::new();
        map.add_origin("main.scad", "head();\ntail();\n", None);
        // Splice at the start of line 2
        map.add_origin("lib.scad", "mid();\n", Some(8));
        assert_eq!(map.combined(), "head();\nmid();\ntail();\n");

        // The spliced content maps to lib.scad
        let loc = map.location(8).unwrap();
        assert_eq!(loc.origin, "lib.scad");
        assert_eq!((loc.line, loc.column), (1, 1));

        // The shifted tail still maps to main.scad line 2
        let loc = map.location(15).unwrap();
        assert_eq!(loc.origin, "main.scad");
        assert_eq!((loc.line, loc.column), (2, 1));
        assert_eq!(loc.offset, 8);
    }

    #[test]
    fn test_splice_mid_line_columns() {
        let mut map = SourceMap::new();
        map.add_origin("main.scad", "abcdef", None);
        map.add_origin("ins", "XY", Some(3));
        assert_eq!(map.combined(), "abcXYdef");
        let loc = map.location(5).unwrap();
        assert_eq!(loc.origin, "main.scad");
        // `d` was column 4 in the original
        assert_eq!((loc.line, loc.column), (1, 4));
        assert_eq!(loc.offset, 3);
    }

    #[test]
    fn test_gap_is_padded_and_out_of_range() {
        let mut map = SourceMap::new();
        map.add_origin("a", "aa", None);
        map.add_origin("b", "bb", Some(5));
        assert_eq!(map.combined(), "aa   bb");
        assert!(map.location(3).is_err());
        assert!(map.location(7).is_err());
        assert_eq!(map.location(5).unwrap().origin, "b");
    }

    #[test]
    fn test_blank_range_keeps_offsets() {
        let mut map = SourceMap::new();
        map.add_origin("main.scad", "abc\ndef\nghi", None);
        map.blank_range(4, 3);
        assert_eq!(map.combined(), "abc\n   \nghi");
        // Locations after the blank are untouched
        let loc = map.location(8).unwrap();
        assert_eq!((loc.line, loc.column), (3, 1));
    }

    #[test]
    fn test_blank_range_preserves_newlines() {
        let mut map = SourceMap::new();
        map.add_origin("main.scad", "aa\nbb\ncc", None);
        map.blank_range(0, 8);
        assert_eq!(map.combined(), "  \n  \n  ");
        assert_eq!(map.location(6).unwrap().line, 3);
    }

    #[test]
    fn test_segments_stay_sorted() {
        let mut map = SourceMap::new();
        map.add_origin("a", "1111", None);
        map.add_origin("b", "22", Some(2));
        map.add_origin("c", "3", Some(0));
        let starts: Vec<usize> = map.segments().iter().map(|s| s.combined_start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(map.combined(), "3112211");
    }

    #[test]
    fn test_empty_map() {
        let map = SourceMap::new();
        assert_eq!(map.combined(), "");
        assert!(map.location(0).is_err());
    }
}
