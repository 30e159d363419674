//! A headless engine for viewing large, semi-structured row sets through a small window.
//!
//! For host-side plumbing (request dispatch, seek input, a list surface), see the
//! `rowview-adapter` crate.
//!
//! The crate covers three concerns:
//! - [`RowSource`]: an ordered, paged, seekable supply of JSON rows;
//! - [`ColumnTree`]: column inference over rows as they arrive;
//! - [`Viewer`]: a generation-guarded reconciliation loop that keeps a rendered window of
//!   rows around the viewport, fetching, revealing and evicting rows as the user scrolls.
//!
//! It is UI-agnostic and does no I/O. A TUI/GUI layer is expected to provide:
//! - a [`RenderSurface`] (row insertion/removal, scrolling, geometry)
//! - an executor for the [`FetchRequest`]s the viewer queues
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod error;
mod generation;
mod loader;
mod options;
mod order;
mod request;
mod schema;
mod source;
mod state;
mod surface;
mod types;
mod viewer;

#[cfg(test)]
mod tests;

pub use error::{SourceError, SourceResult};
pub use generation::{Freshness, Generation, GenerationGuard};
pub use loader::LoaderState;
pub use options::ViewerOptions;
pub use order::{OrderSpec, compare_values, lookup};
pub use request::{FetchKind, FetchRequest, FetchResponse, FetchResult, RequestId};
pub use schema::{BatchSummary, Column, ColumnInfo, ColumnTree, DisplayState, NodeId};
pub use source::{DEFAULT_BATCH_SIZE, MemoryRowSource, RowSource};
pub use state::ViewerState;
pub use surface::{Cell, HeaderCell, Layout, RenderSurface, RowRepr, SortIndicator};
pub use types::{
    DesiredWindow, Direction, Page, Row, RowGeometry, RowWindow, SeekResult, ViewportGeometry,
};
pub use viewer::{Applied, Viewer};
