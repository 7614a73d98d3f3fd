// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Display, Formatter};

pub(crate) mod tests;

/// Line number, starting at 1
pub type CaretLine = u32;
/// Column number, starting at 1
pub type CaretCol = u32;

/// Position of a character in the source text.
///
/// `offset` is the byte offset from the start of the text.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct PointLocation {
    pub line: CaretLine,
    pub column: CaretCol,
    pub offset: usize,
}

impl PointLocation {
    pub fn new(line: CaretLine, column: CaretCol, offset: usize) -> Self {
        PointLocation { line, column, offset }
    }

    /// Shifts the position by `text`, as if `text` had been read from the position.
    pub fn advance(&self, text: &str) -> PointLocation {
        let mut loc = *self;
        for c in text.chars() {
            if c == '\n' {
                loc.line += 1;
                loc.column = 1;
            } else {
                loc.column += 1;
            }
        }
        loc.offset += text.len();
        loc
    }
}

impl Display for PointLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Text segment from `start` (included) to `end` (excluded).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub struct SegmentLocation {
    pub start: PointLocation,
    pub end: PointLocation,
}

impl SegmentLocation {
    pub fn new(start: PointLocation, end: PointLocation) -> Self {
        SegmentLocation { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is `other` entirely within this segment?
    pub fn includes(&self, other: &SegmentLocation) -> bool {
        self.start.offset <= other.start.offset && other.end.offset <= self.end.offset
    }

    /// Do the segments share at least one character?
    pub fn overlaps(&self, other: &SegmentLocation) -> bool {
        self.start.offset < other.end.offset && other.start.offset < self.end.offset
    }

    /// Do the segments overlap without one including the other?
    pub fn crosses(&self, other: &SegmentLocation) -> bool {
        self.overlaps(other) && !self.includes(other) && !other.includes(self)
    }

    /// Smallest segment containing both segments.
    pub fn merge(&self, other: &SegmentLocation) -> SegmentLocation {
        SegmentLocation {
            start: if other.start.offset < self.start.offset { other.start } else { self.start },
            end: if other.end.offset > self.end.offset { other.end } else { self.end },
        }
    }

    /// Merges optional segments, ignoring the missing ones.
    pub fn smart_merge(a: Option<SegmentLocation>, b: Option<SegmentLocation>) -> Option<SegmentLocation> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.merge(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Extracts the segment from the text it was computed on.
    pub fn extract<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start.offset..self.end.offset).unwrap_or("")
    }
}

impl Display for SegmentLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
