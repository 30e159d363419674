use rowview::{HeaderCell, RenderSurface, RowGeometry, RowRepr, ViewportGeometry};

use crate::fenwick::Fenwick;

pub const DEFAULT_ROW_HEIGHT: u32 = 20;

/// Measures a row in pixels once it is inserted.
pub type MeasureFn = fn(&RowRepr) -> u32;

fn fixed_height(_: &RowRepr) -> u32 {
    DEFAULT_ROW_HEIGHT
}

/// A headless scroll container: a vertical list of rendered rows under a column header.
///
/// Useful for terminal front ends and for driving a [`rowview::Viewer`] without a real UI.
/// Row heights are kept in a Fenwick tree so geometry lookups stay `O(log n)`.
/// Coordinates are content pixels: row 0 starts at 0 and the viewport is
/// `scroll_offset..scroll_offset + viewport_height`.
#[derive(Clone, Debug)]
pub struct ListSurface {
    header: Vec<HeaderCell>,
    widths: Vec<Option<u32>>,
    rows: Vec<RowRepr>,
    heights: Vec<u32>,
    sums: Fenwick,
    measure: MeasureFn,
    viewport_height: u32,
    scroll: u64,
}

impl ListSurface {
    pub fn new(viewport_height: u32) -> Self {
        Self {
            header: Vec::new(),
            widths: Vec::new(),
            rows: Vec::new(),
            heights: Vec::new(),
            sums: Fenwick::default(),
            measure: fixed_height,
            viewport_height,
            scroll: 0,
        }
    }

    pub fn with_measure(mut self, measure: MeasureFn) -> Self {
        self.measure = measure;
        self
    }

    pub fn header(&self) -> &[HeaderCell] {
        &self.header
    }

    pub fn column_width(&self, column: usize) -> Option<u32> {
        self.widths.get(column).copied().flatten()
    }

    pub fn rows(&self) -> &[RowRepr] {
        &self.rows
    }

    pub fn row_height(&self, position: usize) -> Option<u32> {
        self.heights.get(position).copied()
    }

    pub fn content_height(&self) -> u64 {
        self.sums.total()
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll
    }

    pub fn max_scroll_offset(&self) -> u64 {
        self.content_height()
            .saturating_sub(self.viewport_height as u64)
    }

    /// Sets the scroll offset, clamped to the content. Returns the applied offset.
    pub fn scroll_to(&mut self, offset: u64) -> u64 {
        self.scroll = offset.min(self.max_scroll_offset());
        self.scroll
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height;
        self.clamp_scroll();
    }

    /// Position of the row covering content offset `y`.
    pub fn position_at(&self, y: u64) -> Option<usize> {
        let pos = self.sums.lower_bound(y);
        (pos < self.rows.len()).then_some(pos)
    }

    /// Rows intersecting the viewport.
    pub fn visible_rows(&self) -> &[RowRepr] {
        if self.viewport_height == 0 {
            return &[];
        }
        let Some(first) = self.position_at(self.scroll) else {
            return &[];
        };
        let bottom = self.scroll + self.viewport_height as u64;
        let mut end = self.sums.lower_bound(bottom.saturating_sub(1)) + 1;
        end = end.min(self.rows.len());
        &self.rows[first..end]
    }

    /// The visible rows as plain text lines, cells separated by `" | "`.
    pub fn render_text(&self) -> Vec<String> {
        self.visible_rows()
            .iter()
            .map(|row| {
                let text = row
                    .cells
                    .iter()
                    .map(|c| c.text())
                    .collect::<Vec<_>>()
                    .join(" | ");
                let mark = if row.highlighted { '>' } else { ' ' };
                format!("{mark}{:>6} {text}", row.index)
            })
            .collect()
    }

    fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll_offset());
    }

    fn rebuild_sums(&mut self) {
        self.sums = Fenwick::from_sizes(&self.heights);
    }
}

impl RenderSurface for ListSurface {
    fn replace_column_header(&mut self, cells: &[HeaderCell]) {
        self.header = cells.to_vec();
        self.widths = cells.iter().map(|c| c.width).collect();
    }

    fn insert_rows(&mut self, position: usize, rows: Vec<RowRepr>) {
        let position = position.min(self.rows.len());
        let heights: Vec<u32> = rows.iter().map(self.measure).collect();
        if position == self.rows.len() {
            for &h in &heights {
                self.sums.push_value(h as u64);
            }
            self.heights.extend(heights);
            self.rows.extend(rows);
        } else {
            self.heights.splice(position..position, heights);
            self.rows.splice(position..position, rows);
            self.rebuild_sums();
        }
    }

    fn remove_rows(&mut self, position: usize, count: usize) {
        let start = position.min(self.rows.len());
        let end = position.saturating_add(count).min(self.rows.len());
        if start == end {
            return;
        }
        let at_back = end == self.rows.len();
        self.rows.drain(start..end);
        self.heights.drain(start..end);
        if at_back {
            self.sums.truncate(start);
        } else {
            self.rebuild_sums();
        }
        self.clamp_scroll();
    }

    fn set_column_width(&mut self, column: usize, px: u32) {
        if self.widths.len() <= column {
            self.widths.resize(column + 1, None);
        }
        self.widths[column] = Some(px);
    }

    fn scroll_by(&mut self, px: i64) {
        let target = if px < 0 {
            self.scroll.saturating_sub(px.unsigned_abs())
        } else {
            self.scroll.saturating_add(px as u64)
        };
        self.scroll_to(target);
    }

    fn viewport_geometry(&self) -> ViewportGeometry {
        let top = self.scroll as i64;
        let height = self.viewport_height as i64;
        ViewportGeometry {
            top,
            bottom: top + height,
            height,
        }
    }

    fn rendered_row_geometry(&self, position: usize) -> Option<RowGeometry> {
        let height = *self.heights.get(position)?;
        let top = self.sums.prefix_sum(position) as i64;
        Some(RowGeometry {
            top,
            bottom: top + height as i64,
        })
    }
}
