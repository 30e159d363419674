use serde_json::Value;

use crate::order::lookup;
use crate::schema::{Column, ColumnTree, DisplayState};
use crate::{OrderSpec, Row, RowGeometry, ViewportGeometry};

/// The painting side of the viewer. The engine calls it; it owns pixel geometry.
///
/// Positions are relative to the first rendered row (position 0 is the row at the front of
/// [`crate::Viewer::rendered_range`]).
pub trait RenderSurface {
    fn replace_column_header(&mut self, cells: &[HeaderCell]);
    fn insert_rows(&mut self, position: usize, rows: Vec<RowRepr>);
    fn remove_rows(&mut self, position: usize, count: usize);
    fn set_column_width(&mut self, column: usize, px: u32);
    /// Positive values move the viewport towards later rows.
    fn scroll_by(&mut self, px: i64);
    fn viewport_geometry(&self) -> ViewportGeometry;
    fn rendered_row_geometry(&self, position: usize) -> Option<RowGeometry>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for &mut S {
    fn replace_column_header(&mut self, cells: &[HeaderCell]) {
        (**self).replace_column_header(cells);
    }

    fn insert_rows(&mut self, position: usize, rows: Vec<RowRepr>) {
        (**self).insert_rows(position, rows);
    }

    fn remove_rows(&mut self, position: usize, count: usize) {
        (**self).remove_rows(position, count);
    }

    fn set_column_width(&mut self, column: usize, px: u32) {
        (**self).set_column_width(column, px);
    }

    fn scroll_by(&mut self, px: i64) {
        (**self).scroll_by(px);
    }

    fn viewport_geometry(&self) -> ViewportGeometry {
        (**self).viewport_geometry()
    }

    fn rendered_row_geometry(&self, position: usize) -> Option<RowGeometry> {
        (**self).rendered_row_geometry(position)
    }
}

/// How rows are turned into cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layout {
    /// One cell per inferred column.
    #[default]
    Table,
    /// No columns: each row is a single JSON text cell.
    Raw,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cell {
    Value(String),
    /// An object where a scalar column was expected.
    Nested,
    Missing,
}

impl Cell {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => Self::Missing,
            Some(Value::Object(_)) => Self::Nested,
            Some(Value::String(s)) => Self::Value(s.clone()),
            Some(v) => Self::Value(v.to_string()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Value(s) => s,
            Self::Nested => "{...}",
            Self::Missing => "",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowRepr {
    /// Absolute logical index.
    pub index: usize,
    pub cells: Vec<Cell>,
    pub highlighted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortIndicator {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderCell {
    pub path: Vec<String>,
    pub label: String,
    pub width: Option<u32>,
    pub sort: Option<SortIndicator>,
    /// Set when the column stands for an object whose children are hidden.
    pub collapsed: bool,
}

pub(crate) fn header_cells(
    tree: &ColumnTree,
    columns: &[Column],
    layout: Layout,
    order: &OrderSpec,
    primary_key: Option<&str>,
) -> Vec<HeaderCell> {
    if layout == Layout::Raw {
        return Vec::new();
    }
    let active = order.effective_path(primary_key);
    columns
        .iter()
        .map(|col| {
            let node = tree.node(col.node);
            let is_active = !active.is_empty()
                && active.len() == col.path.len()
                && active.iter().zip(&col.path).all(|(a, b)| *a == b.as_str());
            HeaderCell {
                path: col.path.clone(),
                label: col.label(),
                width: node.and_then(|n| n.width),
                sort: is_active.then_some(if order.descending {
                    SortIndicator::Descending
                } else {
                    SortIndicator::Ascending
                }),
                collapsed: node.is_some_and(|n| {
                    n.has_children() && n.display == DisplayState::Collapsed
                }),
            }
        })
        .collect()
}

pub(crate) fn render_row(
    index: usize,
    row: &Row,
    columns: &[Column],
    layout: Layout,
    highlighted: bool,
) -> RowRepr {
    let cells = match layout {
        Layout::Raw => vec![Cell::Value(row.to_string())],
        Layout::Table => columns
            .iter()
            .map(|col| Cell::from_value(lookup(row, &col.path)))
            .collect(),
    };
    RowRepr {
        index,
        cells,
        highlighted,
    }
}
