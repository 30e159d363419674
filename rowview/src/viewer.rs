use core::cmp;
use core::ops::Range;

use serde_json::Value;

use crate::generation::{Freshness, GenerationGuard};
use crate::schema::{Column, ColumnTree, DisplayState};
use crate::surface::{header_cells, render_row};
use crate::{
    DesiredWindow, Direction, FetchKind, FetchRequest, FetchResponse, FetchResult, Generation,
    Layout, LoaderState, OrderSpec, RenderSurface, RequestId, Row, RowRepr, RowWindow,
    SourceError, ViewerOptions, ViewerState, ViewportGeometry,
};

/// What [`Viewer::apply_response`] did with a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Rows (or a seek position) were merged.
    Merged,
    /// The source reported an error; the loader is idle again.
    Failed,
    /// Tagged with a superseded generation.
    Stale,
    /// No request with this id is outstanding.
    Duplicate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Forward,
    Backward,
    Seek,
}

/// A row visible before a patch, used to keep it still on screen afterwards.
#[derive(Clone, Copy, Debug)]
struct Anchor {
    index: usize,
    /// Distance from the viewport top.
    top: i64,
}

/// The window reconciliation engine.
///
/// Like the rest of this crate it holds no UI objects and never calls a row source:
/// - passes queue [`FetchRequest`]s, drained with [`Self::drain_requests`];
/// - results come back through [`Self::apply_response`], the only place state is mutated by
///   data;
/// - all painting goes through the [`RenderSurface`] passed to each call.
///
/// The host calls [`Self::reconcile`] on scroll/resize and whenever [`Self::needs_pass`]
/// reports a scheduled follow-up.
#[derive(Clone, Debug)]
pub struct Viewer {
    options: ViewerOptions,
    order: OrderSpec,
    primary_key: Option<String>,
    guard: GenerationGuard,

    cache: RowWindow,
    desired: DesiredWindow,
    rendered: Range<usize>,

    forward: LoaderState,
    backward: LoaderState,
    seek: Option<RequestId>,
    last_seek_error: Option<SourceError>,
    // The cached rows were fetched under an order that has since been replaced.
    order_changed: bool,

    schema: ColumnTree,
    columns: Vec<Column>,
    // Indexes already counted by the schema in this generation.
    merged: Option<Range<usize>>,
    header_dirty: bool,
    reset_schema_on_wipe: bool,

    highlight: Option<Range<usize>>,
    seek_anchor: Option<usize>,
    align_front: bool,
    evicted_shift: Option<i64>,

    outbox: Vec<FetchRequest>,
    next_request: u64,
    pass_scheduled: bool,
}

impl Viewer {
    pub fn new(options: ViewerOptions, order: OrderSpec) -> Self {
        vdebug!(
            batch_size = options.batch_size,
            preload_margin = options.preload_margin,
            "Viewer::new"
        );
        let primary_key = options.primary_key.clone();
        Self {
            options,
            order,
            primary_key,
            guard: GenerationGuard::new(),
            cache: RowWindow::default(),
            desired: DesiredWindow::default(),
            rendered: 0..0,
            forward: LoaderState::new(),
            backward: LoaderState::new(),
            seek: None,
            last_seek_error: None,
            order_changed: false,
            schema: ColumnTree::new(),
            columns: Vec::new(),
            merged: None,
            header_dirty: true,
            reset_schema_on_wipe: false,
            highlight: None,
            seek_anchor: None,
            align_front: false,
            evicted_shift: None,
            outbox: Vec::new(),
            next_request: 0,
            pass_scheduled: true,
        }
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// The generation new requests are tagged with.
    pub fn generation(&self) -> Generation {
        self.guard.current()
    }

    pub fn applied_generation(&self) -> Generation {
        self.guard.applied()
    }

    /// The logical row list.
    pub fn cached(&self) -> &RowWindow {
        &self.cache
    }

    pub fn desired_window(&self) -> DesiredWindow {
        self.desired
    }

    /// Logical indexes currently on the surface, in surface order.
    pub fn rendered_range(&self) -> Range<usize> {
        self.rendered.clone()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.cache.get(index)
    }

    pub fn schema(&self) -> &ColumnTree {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn loader(&self, direction: Direction) -> &LoaderState {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }

    pub fn highlight(&self) -> Option<Range<usize>> {
        self.highlight.clone()
    }

    pub fn is_seeking(&self) -> bool {
        self.seek.is_some()
    }

    pub fn last_seek_error(&self) -> Option<&SourceError> {
        self.last_seek_error.as_ref()
    }

    /// True when a follow-up pass has been scheduled.
    pub fn needs_pass(&self) -> bool {
        self.pass_scheduled
    }

    pub fn has_requests(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Takes the requests queued since the last call, oldest first.
    pub fn drain_requests(&mut self) -> Vec<FetchRequest> {
        core::mem::take(&mut self.outbox)
    }

    pub fn state(&self) -> ViewerState {
        ViewerState {
            generation: self.guard.current(),
            applied: self.guard.applied(),
            cached: self.cache.range(),
            desired: self.desired,
            rendered: self.rendered.clone(),
            forward_end: self.forward.hit_end(),
            backward_end: self.backward.hit_end(),
            highlight: self.highlight.clone(),
        }
    }

    /// Rebinds the viewer to a new order (and the new source the host created for it).
    ///
    /// Starts a new generation. The current rows stay on screen until the first page of the
    /// new generation arrives, then they are wiped.
    pub fn reset(&mut self, order: OrderSpec, primary_key: Option<String>) {
        let reordered = order != self.order;
        vdebug!(?order, reordered, "Viewer::reset");
        self.order = order;
        self.primary_key = primary_key;
        self.restart_generation();
        self.order_changed = true;
        self.header_dirty = true;
        if reordered && self.options.reset_schema_on_reorder {
            self.reset_schema_on_wipe = true;
        }
    }

    /// Starts a seek for `key` under the current order.
    pub fn seek(&mut self, key: Value) -> RequestId {
        self.restart_generation();
        let id = self.next_id();
        vdebug!(?key, id = id.0, "Viewer::seek");
        self.outbox.push(FetchRequest {
            id,
            generation: self.guard.current(),
            kind: FetchKind::Seek { key },
        });
        self.seek = Some(id);
        self.last_seek_error = None;
        id
    }

    /// The source gained rows past its previous end.
    pub fn notify_appended(&mut self) {
        self.forward.reopen();
        self.pass_scheduled = true;
    }

    /// Makes every in-flight response stale. Call before dropping the viewer or its source.
    pub fn invalidate(&mut self) {
        self.restart_generation();
        self.pass_scheduled = false;
    }

    fn restart_generation(&mut self) {
        self.guard.bump();
        self.forward.reset();
        self.backward.reset();
        self.seek = None;
        self.outbox.clear();
        self.pass_scheduled = true;
    }

    fn next_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn issue(&mut self, direction: Direction, kind: FetchKind, bound: usize) {
        let id = self.next_id();
        vtrace!(id = id.0, ?kind, generation = self.guard.current().0, "issue");
        match direction {
            Direction::Forward => self.forward.begin(id, bound),
            Direction::Backward => self.backward.begin(id, bound),
        }
        self.outbox.push(FetchRequest {
            id,
            generation: self.guard.current(),
            kind,
        });
    }

    /// One reconciliation pass: decide what to fetch, evict, and render.
    pub fn reconcile<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        self.pass_scheduled = false;

        if self.guard.awaiting_reset() {
            // Old rows stay up until the new generation delivers.
            if self.seek.is_none() && self.forward.can_issue() {
                self.issue(Direction::Forward, FetchKind::FromStart, 0);
            }
            return;
        }

        if self.cache.is_empty() {
            let offset = self.cache.offset;
            if self.forward.can_issue() {
                let kind = if offset == 0 {
                    FetchKind::FromStart
                } else {
                    FetchKind::From { index: offset }
                };
                self.issue(Direction::Forward, kind, offset);
            } else if self.forward.hit_end() && offset > 0 && self.backward.can_issue() {
                self.issue(Direction::Backward, FetchKind::Before { index: offset }, offset);
            } else if self.forward.hit_end() && offset > 0 && !self.backward.is_pending() {
                // Nothing on either side of a best-effort seek offset.
                vwarn!(offset, "no rows around seek position; loading from the start");
                self.cache = RowWindow::new(0);
                self.desired = DesiredWindow::empty_at(0);
                self.rendered = 0..0;
                self.highlight = None;
                self.seek_anchor = None;
                self.forward.reset();
                self.backward.reset();
                self.issue(Direction::Forward, FetchKind::FromStart, 0);
            }
            return;
        }

        let viewport = surface.viewport_geometry();
        self.release_seek_anchor_if_scrolled_away(surface, &viewport);

        let len = self.rendered.len();
        let first = if len > 0 {
            surface.rendered_row_geometry(0)
        } else {
            None
        };
        let last = if len > 0 {
            surface.rendered_row_geometry(len - 1)
        } else {
            None
        };
        let preload = self.options.preload_margin;

        let mut need_forward = match last {
            Some(g) => g.bottom < viewport.bottom + preload,
            None => len == 0,
        };
        let mut need_backward = self.desired.front > 0
            && match first {
                Some(g) => g.top > viewport.top - preload,
                None => len == 0 && self.forward.hit_end(),
            };

        if len >= 2 {
            let overscroll = self.options.effective_overscroll_margin();
            let mid = len / 2;
            if let Some(m) = surface.rendered_row_geometry(mid) {
                if m.bottom < viewport.top - overscroll && !self.backward.is_pending() {
                    let drop_to = self.rendered.start + mid;
                    let shift = first.map_or(0, |f| m.top - f.top);
                    vdebug!(from = self.rendered.start, to = drop_to, shift, "evict front");
                    self.cache.drop_front(drop_to);
                    self.desired.front = drop_to;
                    self.evicted_shift = Some(shift);
                    self.backward.reopen();
                    need_backward = false;
                } else if m.top > viewport.bottom + overscroll && !self.forward.is_pending() {
                    let drop_from = self.rendered.start + mid;
                    vdebug!(from = drop_from, to = self.rendered.end, "evict back");
                    self.cache.truncate(drop_from);
                    self.desired.back = drop_from;
                    self.forward.reopen();
                    need_forward = false;
                }
            }
        }

        let batch = self.options.batch_size;
        if need_forward {
            if self.desired.back < self.cache.end() {
                self.desired.back = cmp::min(self.cache.end(), self.desired.back + batch);
                self.pass_scheduled = true;
            } else if self.forward.can_issue() {
                let index = self.cache.end();
                self.issue(Direction::Forward, FetchKind::From { index }, index);
            }
        }
        if need_backward {
            if self.desired.front > self.cache.offset {
                self.desired.front =
                    cmp::max(self.cache.offset, self.desired.front.saturating_sub(batch));
                self.pass_scheduled = true;
            } else if self.cache.offset > 0 && self.backward.can_issue() {
                let index = self.cache.offset;
                self.issue(Direction::Backward, FetchKind::Before { index }, index);
            }
        }

        self.patch(surface, false);
    }

    /// The single entry point for asynchronous results.
    ///
    /// Stale and duplicate responses are dropped without touching any state. A response of a
    /// newer generation that carries data wipes the rendered window before it is merged.
    pub fn apply_response<S: RenderSurface + ?Sized>(
        &mut self,
        response: FetchResponse,
        surface: &mut S,
    ) -> Applied {
        let FetchResponse {
            id,
            generation,
            result,
        } = response;

        let freshness = self.guard.classify(generation);
        if freshness == Freshness::Stale {
            vtrace!(id = id.0, generation = generation.0, "discarding stale response");
            return Applied::Stale;
        }

        let slot = if self.forward.pending_request() == Some(id) {
            Slot::Forward
        } else if self.backward.pending_request() == Some(id) {
            Slot::Backward
        } else if self.seek == Some(id) {
            Slot::Seek
        } else {
            vtrace!(id = id.0, "discarding duplicate response");
            return Applied::Duplicate;
        };

        let carries_data = match &result {
            FetchResult::Page(r) => is_data(r.as_ref().map(|_| ())),
            FetchResult::Before(r) => is_data(r.as_ref().map(|_| ())),
            FetchResult::Seek(r) => r.is_ok(),
        };
        if carries_data && freshness == Freshness::Newer {
            self.wipe(surface);
            self.guard.mark_applied(generation);
        }

        let mut salvaged = false;
        let outcome = match (slot, result) {
            (Slot::Forward, FetchResult::Page(result)) => {
                let index = self.forward.bound().unwrap_or(self.cache.end());
                self.forward.settle(id);
                match result {
                    Ok(page) => {
                        if self.merge_forward(index, page.rows) {
                            self.forward.succeed(page.is_end);
                        }
                        Applied::Merged
                    }
                    Err(err) => {
                        vwarn!(%err, index, "forward fetch failed");
                        let (err, rows) = split_partial(err);
                        if let Some(rows) = rows {
                            salvaged = true;
                            self.merge_forward(index, rows);
                        }
                        self.forward.fail(err);
                        Applied::Failed
                    }
                }
            }
            (Slot::Backward, FetchResult::Before(result)) => {
                let index = self.backward.bound().unwrap_or(self.cache.offset);
                self.backward.settle(id);
                match result {
                    Ok(rows) => {
                        let empty = rows.is_empty();
                        if self.merge_backward(index, rows) {
                            self.backward.succeed(empty || self.cache.offset == 0);
                        }
                        Applied::Merged
                    }
                    Err(err) => {
                        vwarn!(%err, index, "backward fetch failed");
                        let (err, rows) = split_partial(err);
                        if let Some(rows) = rows {
                            salvaged = true;
                            self.merge_backward(index, rows);
                        }
                        self.backward.fail(err);
                        Applied::Failed
                    }
                }
            }
            (Slot::Seek, FetchResult::Seek(result)) => {
                self.seek = None;
                match result {
                    Ok(found) => {
                        vdebug!(offset = found.offset, count = found.count, "seek resolved");
                        if !self.rendered.is_empty() {
                            surface.remove_rows(0, self.rendered.len());
                        }
                        self.cache = RowWindow::new(found.offset);
                        self.desired = DesiredWindow::empty_at(found.offset);
                        self.rendered = found.offset..found.offset;
                        self.highlight =
                            (found.count > 0).then(|| found.offset..found.offset + found.count);
                        self.seek_anchor = Some(found.offset);
                        self.align_front = false;
                        let kind = if found.offset == 0 {
                            FetchKind::FromStart
                        } else {
                            FetchKind::From {
                                index: found.offset,
                            }
                        };
                        self.issue(Direction::Forward, kind, found.offset);
                        Applied::Merged
                    }
                    Err(err) => {
                        vwarn!(%err, "seek failed");
                        self.fail_seek(err);
                        Applied::Failed
                    }
                }
            }
            (slot, _) => {
                vwarn!(?slot, id = id.0, "response kind does not match its request");
                let err = SourceError::query("response kind does not match its request");
                match slot {
                    Slot::Forward => {
                        self.forward.settle(id);
                        self.forward.fail(err);
                    }
                    Slot::Backward => {
                        self.backward.settle(id);
                        self.backward.fail(err);
                    }
                    Slot::Seek => {
                        self.seek = None;
                        self.fail_seek(err);
                    }
                }
                Applied::Failed
            }
        };

        // Failures wait for the next scroll or resize before retrying.
        if outcome == Applied::Merged || salvaged {
            self.pass_scheduled = true;
            let rebuild = self.refresh_columns(surface);
            self.patch(surface, rebuild);
        }
        outcome
    }

    /// Sets a column's width on the surface and remembers it across re-ordering.
    pub fn set_column_width<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        column: usize,
        px: u32,
    ) -> bool {
        let Some(col) = self.columns.get(column) else {
            return false;
        };
        self.schema.set_width(col.node, Some(px));
        surface.set_column_width(column, px);
        true
    }

    /// Collapses or expands the object column at `path`, rebuilding header and rows.
    pub fn toggle_column_display<S: RenderSurface + ?Sized, P: AsRef<str>>(
        &mut self,
        surface: &mut S,
        path: &[P],
    ) -> Option<DisplayState> {
        let state = self.schema.toggle_display(path)?;
        self.header_dirty = true;
        let rebuild = self.refresh_columns(surface);
        self.patch(surface, rebuild);
        Some(state)
    }

    /// Keeps the current window after a failed seek, unless it belongs to a replaced order.
    /// In that case the guard keeps waiting and the next pass loads the new order from the
    /// start.
    fn fail_seek(&mut self, err: SourceError) {
        self.last_seek_error = Some(err);
        if self.order_changed {
            vdebug!("window predates the current order; reloading");
            self.pass_scheduled = true;
        } else {
            self.guard.adopt_current();
        }
    }

    /// Returns false when the page was dropped.
    fn merge_forward(&mut self, index: usize, rows: Vec<Row>) -> bool {
        if self.cache.is_empty() {
            self.cache = RowWindow::new(index);
            if self.desired.is_empty() {
                self.desired = DesiredWindow::empty_at(index);
            }
        }
        if index != self.cache.end() {
            vwarn!(index, end = self.cache.end(), "forward page does not abut the cache");
            return false;
        }
        let added = index..index + rows.len();
        self.cache.append(rows);
        if self.desired.back == index {
            self.desired.back = self.cache.end();
        }
        self.observe(added);
        true
    }

    fn merge_backward(&mut self, index: usize, mut rows: Vec<Row>) -> bool {
        if index != self.cache.offset {
            vwarn!(index, offset = self.cache.offset, "backward page does not abut the cache");
            return false;
        }
        if rows.len() > index {
            let excess = rows.len() - index;
            rows.drain(..excess);
        }
        let added = index - rows.len()..index;
        self.cache.prepend(rows);
        if self.desired.front == index {
            self.desired.front = self.cache.offset;
        }
        self.observe(added);
        true
    }

    /// Counts rows in `added` that this generation has not counted yet.
    fn observe(&mut self, added: Range<usize>) {
        if added.is_empty() {
            return;
        }
        let fresh: Vec<Range<usize>> = match &self.merged {
            None => vec![added.clone()],
            Some(seen) => {
                let mut parts = Vec::new();
                if added.start < seen.start {
                    parts.push(added.start..cmp::min(added.end, seen.start));
                }
                if added.end > seen.end {
                    parts.push(cmp::max(added.start, seen.end)..added.end);
                }
                parts
            }
        };
        self.merged = Some(match &self.merged {
            None => added,
            Some(seen) => cmp::min(seen.start, added.start)..cmp::max(seen.end, added.end),
        });

        let rows = fresh
            .into_iter()
            .flatten()
            .filter_map(|i| self.cache.get(i));
        self.schema.observe(rows, self.primary_key.as_deref());
    }

    /// Re-derives the flattened columns. Returns true when their shape changed, which forces
    /// a full row rebuild.
    fn refresh_columns<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        let columns = self.schema.columns();
        let changed = columns != self.columns;
        if !changed && !self.header_dirty {
            return false;
        }
        self.columns = columns;
        self.header_dirty = false;
        let cells = header_cells(
            &self.schema,
            &self.columns,
            self.options.layout,
            &self.order,
            self.primary_key.as_deref(),
        );
        vdebug!(columns = cells.len(), changed, "replace column header");
        surface.replace_column_header(&cells);
        for (i, cell) in cells.iter().enumerate() {
            if let Some(w) = cell.width {
                surface.set_column_width(i, w);
            }
        }
        changed && self.options.layout == Layout::Table
    }

    fn wipe<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        vdebug!(
            rendered = self.rendered.len(),
            generation = self.guard.current().0,
            "wipe rendered window"
        );
        if !self.rendered.is_empty() {
            surface.remove_rows(0, self.rendered.len());
        }
        self.rendered = 0..0;
        self.cache = RowWindow::default();
        self.desired = DesiredWindow::default();
        self.highlight = None;
        self.seek_anchor = None;
        self.evicted_shift = None;
        self.merged = None;
        self.order_changed = false;
        self.align_front = true;
        if self.reset_schema_on_wipe {
            self.reset_schema_on_wipe = false;
            self.schema = ColumnTree::new();
            self.header_dirty = true;
        }
    }

    fn reprs(&self, range: Range<usize>) -> Vec<RowRepr> {
        range
            .filter_map(|i| {
                let row = self.cache.get(i);
                debug_assert!(row.is_some(), "rendering uncached row {i}");
                let highlighted = self.highlight.as_ref().is_some_and(|h| h.contains(&i));
                row.map(|row| render_row(i, row, &self.columns, self.options.layout, highlighted))
            })
            .collect()
    }

    /// Applies the desired window to the surface with the minimal insert/remove set, then
    /// corrects the scroll position.
    fn patch<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, rebuild: bool) {
        let target = self.desired.range();
        debug_assert!(
            self.cache.contains_range(&target),
            "desired window {target:?} outside cache {:?}",
            self.cache.range()
        );
        let old = self.rendered.clone();
        if !rebuild && old == target {
            self.apply_fallback_anchor(surface);
            return;
        }

        let viewport = surface.viewport_geometry();
        let lo = cmp::max(old.start, target.start);
        let hi = cmp::min(old.end, target.end);
        let incremental = !rebuild && lo < hi;
        let anchor = if lo < hi {
            self.capture_anchor(surface, &viewport, lo..hi)
        } else {
            None
        };

        if incremental {
            if target.end < old.end {
                surface.remove_rows(target.end - old.start, old.end - target.end);
            }
            if old.start < target.start {
                surface.remove_rows(0, target.start - old.start);
            }
            if target.start < old.start {
                surface.insert_rows(0, self.reprs(target.start..old.start));
            }
            if old.end < target.end {
                surface.insert_rows(hi - target.start, self.reprs(old.end..target.end));
            }
        } else {
            if !old.is_empty() {
                surface.remove_rows(0, old.len());
            }
            if !target.is_empty() {
                surface.insert_rows(0, self.reprs(target.clone()));
            }
        }
        vtrace!(
            old_start = old.start,
            old_end = old.end,
            new_start = target.start,
            new_end = target.end,
            incremental,
            "patched window"
        );
        self.rendered = target;

        if self.apply_seek_anchor(surface) {
            self.evicted_shift = None;
            return;
        }
        match anchor {
            Some(anchor) => {
                self.evicted_shift = None;
                if let Some(g) = surface.rendered_row_geometry(anchor.index - self.rendered.start)
                {
                    let delta = g.top - surface.viewport_geometry().top - anchor.top;
                    if delta != 0 {
                        surface.scroll_by(delta);
                    }
                }
            }
            None => self.apply_fallback_anchor(surface),
        }
    }

    fn apply_fallback_anchor<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.rendered.is_empty() {
            return;
        }
        if self.align_front {
            self.align_front = false;
            self.evicted_shift = None;
            if let Some(g) = surface.rendered_row_geometry(0) {
                let delta = g.top - surface.viewport_geometry().top;
                if delta != 0 {
                    surface.scroll_by(delta);
                }
            }
        } else if let Some(shift) = self.evicted_shift.take() {
            if shift != 0 {
                surface.scroll_by(-shift);
            }
        }
    }

    /// Finds the first overlapping row that intersects the viewport (rows are laid out top to
    /// bottom, so a binary search suffices).
    fn capture_anchor<S: RenderSurface + ?Sized>(
        &self,
        surface: &S,
        viewport: &ViewportGeometry,
        overlap: Range<usize>,
    ) -> Option<Anchor> {
        let base = self.rendered.start;
        let (mut lo, mut hi) = (overlap.start, overlap.end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match surface.rendered_row_geometry(mid - base) {
                Some(g) if g.bottom <= viewport.top => lo = mid + 1,
                _ => hi = mid,
            }
        }
        let index = if lo < overlap.end { lo } else { overlap.start };
        let g = surface.rendered_row_geometry(index - base)?;
        Some(Anchor {
            index,
            top: g.top - viewport.top,
        })
    }

    /// Keeps a freshly seeked row at the lead-in offset until rows above it exist (or it is
    /// the very first row). Returns true when it positioned the viewport.
    fn apply_seek_anchor<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        let Some(target) = self.seek_anchor else {
            return false;
        };
        if !self.rendered.contains(&target) {
            return false;
        }
        let Some(g) = surface.rendered_row_geometry(target - self.rendered.start) else {
            return false;
        };
        let wanted = surface.viewport_geometry().top + self.options.seek_lead_in;
        let delta = g.top - wanted;
        if delta != 0 {
            surface.scroll_by(delta);
        }
        if target > self.rendered.start || target == 0 {
            self.seek_anchor = None;
        }
        self.align_front = false;
        true
    }

    fn release_seek_anchor_if_scrolled_away<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &S,
        viewport: &ViewportGeometry,
    ) {
        let Some(target) = self.seek_anchor else {
            return;
        };
        if !self.rendered.contains(&target) {
            // Seeked past the last row: nothing to pin.
            if target >= self.rendered.end && self.forward.hit_end() {
                self.seek_anchor = None;
            }
            return;
        }
        let visible = surface
            .rendered_row_geometry(target - self.rendered.start)
            .is_some_and(|g| g.intersects(viewport));
        if !visible {
            self.seek_anchor = None;
        }
    }
}

/// Splits the rows a partial failure delivered from its underlying error.
fn split_partial(err: SourceError) -> (SourceError, Option<Vec<Row>>) {
    match err {
        SourceError::Partial { rows, source } => (*source, Some(rows)),
        other => (other, None),
    }
}

fn is_data(result: Result<(), &SourceError>) -> bool {
    match result {
        Ok(()) => true,
        Err(SourceError::Partial { rows, .. }) => !rows.is_empty(),
        Err(_) => false,
    }
}
