//! Source-offset bookkeeping for tokens and DOM nodes, adapted from
//! [codemap](https://crates.io/crates/codemap).

use peg::str::LineCol;
use serde::Serialize;

/// A token source range: a half-open byte range into the original wikitext.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub(crate) struct Tsr {
    /// The position of the first byte of the range.
    pub start: usize,

    /// The position after the last byte of the range.
    pub end: usize,
}

impl Tsr {
    /// Creates a new range.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        Tsr { start, end }
    }

    /// Returns true if this range is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }

    /// The length of the range, in bytes.
    #[inline]
    pub fn len(self) -> usize {
        self.end - self.start
    }

    /// Creates a range that encloses both `self` and `other`.
    #[inline]
    pub fn merge(self, other: Tsr) -> Tsr {
        Tsr {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[inline]
    /// Converts the range into a form that can be used for string indexing.
    // This is not just using `From<core::ops::Range<usize>>` because type
    // resolution fails in common use with `.into()` which eliminates any
    // benefit of using a standard conversion trait
    pub fn into_range(self) -> core::ops::Range<usize> {
        self.start..self.end
    }
}

/// A record of a source file’s lines, used to turn byte offsets into
/// line/column pairs for diagnostics.
#[derive(Clone)]
pub(crate) struct FileMap<'a> {
    /// The source text.
    source: &'a str,

    /// Byte positions of line beginnings.
    lines: Vec<u32>,
}

impl core::fmt::Debug for FileMap<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut limit = 100.min(self.source.len());
        while !self.source.is_char_boundary(limit) {
            limit += 1;
        }

        f.debug_struct("FileMap")
            .field(
                "source",
                &format!(
                    "{}{}",
                    &self.source[..limit],
                    if self.source.len() > limit { "…" } else { "" }
                ),
            )
            .finish()
    }
}

impl core::ops::Deref for FileMap<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.source
    }
}

impl<'a> FileMap<'a> {
    /// Creates a new file map over the given source.
    pub fn new(source: &'a str) -> Self {
        let lines = core::iter::once(0)
            .chain(
                source
                    .match_indices('\n')
                    .map(|(p, _)| u32::try_from(p + 1).unwrap()),
            )
            .collect();

        Self { source, lines }
    }

    /// Gets the line and column of a byte offset.
    ///
    /// # Panics
    ///
    /// * If `pos` is not within the source
    /// * If `pos` points to a byte in the middle of a UTF-8 character
    pub fn find_line_col(&self, pos: usize) -> LineCol {
        let line = self.find_line(pos);
        let line_start = usize::try_from(self.lines[line]).unwrap();
        let column = self.source[line_start..pos].chars().count();
        LineCol {
            line: line + 1,
            column: column + 1,
            offset: pos,
        }
    }

    /// Gets the 0-indexed line number of a byte offset.
    fn find_line(&self, pos: usize) -> usize {
        assert!(pos <= self.source.len());
        let pos = u32::try_from(pos).unwrap();
        match self.lines.binary_search(&pos) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_and_len() {
        let a = Tsr::new(2, 5);
        let b = Tsr::new(4, 9);
        assert_eq!(a.merge(b), Tsr::new(2, 9));
        assert_eq!(a.len(), 3);
        assert!(!a.is_empty());
        assert!(Tsr::new(5, 5).is_empty());
    }

    #[test]
    fn line_col() {
        let map = FileMap::new("ab\ncd\n");
        let lc = map.find_line_col(4);
        assert_eq!((lc.line, lc.column), (2, 2));
    }
}
