use serde_json::Value;

use crate::{OrderSpec, Page, Row, SeekResult, SourceError, SourceResult};

/// The paging capability the viewer reads rows through.
///
/// Methods are plain calls: the viewer never invokes them directly. It queues
/// [`crate::FetchRequest`]s, and the host runs them (now, later, or out of order) and hands the
/// results back via [`crate::Viewer::apply_response`].
///
/// A source is bound to one [`OrderSpec`]; a new order means a new source.
pub trait RowSource {
    /// First page in the current order.
    fn rows_from_start(&mut self) -> SourceResult<Page>;

    /// Contiguous page starting at absolute `index`.
    ///
    /// `Page::is_end` must be true iff the page is shorter than the source's batch size.
    fn rows_from(&mut self, index: usize) -> SourceResult<Page>;

    /// Page ending just before absolute `index`. Empty when `index` lies past the data.
    ///
    /// Sources that cannot revisit earlier rows return [`SourceError::Unsupported`].
    fn rows_before(&mut self, index: usize) -> SourceResult<Vec<Row>>;

    /// Locates `key` under the current order.
    ///
    /// Sources without positioning support may return a best-effort offset.
    fn seek(&mut self, key: &Value) -> SourceResult<SeekResult>;

    /// Best-effort cleanup before the source is dropped or replaced.
    fn cancel_pending_requests(&mut self) {}

    fn primary_key(&self) -> Option<&str>;
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn rows_from_start(&mut self) -> SourceResult<Page> {
        (**self).rows_from_start()
    }

    fn rows_from(&mut self, index: usize) -> SourceResult<Page> {
        (**self).rows_from(index)
    }

    fn rows_before(&mut self, index: usize) -> SourceResult<Vec<Row>> {
        (**self).rows_before(index)
    }

    fn seek(&mut self, key: &Value) -> SourceResult<SeekResult> {
        (**self).seek(key)
    }

    fn cancel_pending_requests(&mut self) {
        (**self).cancel_pending_requests();
    }

    fn primary_key(&self) -> Option<&str> {
        (**self).primary_key()
    }
}

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// An in-memory reference source: rows kept sorted under an [`OrderSpec`].
#[derive(Clone, Debug)]
pub struct MemoryRowSource {
    rows: Vec<Row>,
    order: OrderSpec,
    primary_key: Option<String>,
    batch_size: usize,
    forward_only: bool,
    cancelled: usize,
}

impl MemoryRowSource {
    pub fn new(mut rows: Vec<Row>, order: OrderSpec, primary_key: Option<String>) -> Self {
        let pk = primary_key.as_deref();
        rows.sort_by(|a, b| order.compare_rows(a, b, pk));
        Self {
            rows,
            order,
            primary_key,
            batch_size: DEFAULT_BATCH_SIZE,
            forward_only: false,
            cancelled: 0,
        }
    }

    /// Builds a source keyed by `"id"`, sorted by it.
    pub fn with_id_key(rows: Vec<Row>) -> Self {
        Self::new(rows, OrderSpec::default(), Some("id".to_string()))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Makes `rows_before` fail with [`SourceError::Unsupported`].
    pub fn with_forward_only(mut self, forward_only: bool) -> Self {
        self.forward_only = forward_only;
        self
    }

    /// The same data re-sorted under `order`.
    pub fn reordered(&self, order: OrderSpec) -> Self {
        Self::new(self.rows.clone(), order, self.primary_key.clone())
            .with_batch_size(self.batch_size)
            .with_forward_only(self.forward_only)
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// How many times `cancel_pending_requests` was called.
    pub fn cancel_count(&self) -> usize {
        self.cancelled
    }

    /// Inserts rows at their sorted positions.
    ///
    /// Returns the lowest index that changed, so the host knows whether the viewer must be
    /// notified.
    pub fn insert(&mut self, rows: impl IntoIterator<Item = Row>) -> Option<usize> {
        let pk = self.primary_key.as_deref();
        let mut lowest: Option<usize> = None;
        for row in rows {
            let at = self
                .rows
                .partition_point(|r| self.order.compare_rows(r, &row, pk).is_le());
            self.rows.insert(at, row);
            lowest = Some(lowest.map_or(at, |l| l.min(at)));
        }
        lowest
    }

    fn page(&self, start: usize) -> Page {
        let start = start.min(self.rows.len());
        let end = start.saturating_add(self.batch_size).min(self.rows.len());
        let rows = self.rows[start..end].to_vec();
        let is_end = rows.len() < self.batch_size;
        Page { rows, is_end }
    }
}

impl RowSource for MemoryRowSource {
    fn rows_from_start(&mut self) -> SourceResult<Page> {
        Ok(self.page(0))
    }

    fn rows_from(&mut self, index: usize) -> SourceResult<Page> {
        Ok(self.page(index))
    }

    fn rows_before(&mut self, index: usize) -> SourceResult<Vec<Row>> {
        if self.forward_only {
            return Err(SourceError::unsupported(
                "rows_before is not supported once rows are deleted",
            ));
        }
        if index > self.rows.len() {
            // A page ending at `index` would start past the data.
            return Ok(Vec::new());
        }
        let start = index.saturating_sub(self.batch_size);
        Ok(self.rows[start..index].to_vec())
    }

    fn seek(&mut self, key: &Value) -> SourceResult<SeekResult> {
        let pk = self.primary_key.as_deref();
        let offset = self
            .rows
            .partition_point(|r| self.order.compare_key(r, key, pk).is_lt());
        let count = self.rows[offset..]
            .iter()
            .take_while(|r| self.order.compare_key(r, key, pk).is_eq())
            .count();
        Ok(SeekResult { offset, count })
    }

    fn cancel_pending_requests(&mut self) {
        self.cancelled += 1;
    }

    fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }
}
