use core::ops::Range;

/// One semi-structured record. Rows are never mutated once received.
pub type Row = serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Forward,
    Backward,
}

/// A contiguous slice of the logical row sequence.
///
/// `rows[i]` is the row at logical index `offset + i`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowWindow {
    pub offset: usize,
    pub rows: Vec<Row>,
}

impl RowWindow {
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One past the last cached index.
    pub fn end(&self) -> usize {
        self.offset + self.rows.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        index
            .checked_sub(self.offset)
            .and_then(|i| self.rows.get(i))
    }

    pub fn contains_range(&self, range: &Range<usize>) -> bool {
        range.is_empty() || (range.start >= self.offset && range.end <= self.end())
    }

    pub(crate) fn append(&mut self, rows: Vec<Row>) {
        self.rows.extend(rows);
    }

    pub(crate) fn prepend(&mut self, mut rows: Vec<Row>) {
        self.offset = self.offset.saturating_sub(rows.len());
        rows.append(&mut self.rows);
        self.rows = rows;
    }

    /// Drops cached rows before `index`.
    pub(crate) fn drop_front(&mut self, index: usize) {
        let n = index.saturating_sub(self.offset).min(self.rows.len());
        self.rows.drain(..n);
        self.offset += n;
    }

    /// Drops cached rows at and after `index`.
    pub(crate) fn truncate(&mut self, index: usize) {
        self.rows.truncate(index.saturating_sub(self.offset));
    }
}

/// The logical index range the reconciliation engine wants rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DesiredWindow {
    pub front: usize,
    pub back: usize, // exclusive
}

impl DesiredWindow {
    pub fn empty_at(index: usize) -> Self {
        Self {
            front: index,
            back: index,
        }
    }

    pub fn len(&self) -> usize {
        self.back.saturating_sub(self.front)
    }

    pub fn is_empty(&self) -> bool {
        self.front >= self.back
    }

    pub fn range(&self) -> Range<usize> {
        self.front..self.back
    }
}

/// One page returned by a forward fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    /// True when the page was short of the batch size: no further forward data exists under
    /// the current order.
    pub is_end: bool,
}

impl Page {
    pub fn new(rows: Vec<Row>, is_end: bool) -> Self {
        Self { rows, is_end }
    }
}

/// Where a key lives under the current order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeekResult {
    pub offset: usize,
    pub count: usize,
}

/// Viewport geometry in surface pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportGeometry {
    pub top: i64,
    pub bottom: i64,
    pub height: i64,
}

/// Geometry of one rendered row, in the same coordinate space as [`ViewportGeometry`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowGeometry {
    pub top: i64,
    pub bottom: i64,
}

impl RowGeometry {
    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn intersects(&self, viewport: &ViewportGeometry) -> bool {
        self.bottom > viewport.top && self.top < viewport.bottom
    }
}
