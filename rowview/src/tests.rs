use crate::*;

use serde_json::{Value, json};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        let span = end_exclusive - start;
        start + (self.next_u64() % span)
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        self.gen_range_u64(start as u64, end_exclusive as u64) as usize
    }

    fn gen_range_i64(&mut self, start: i64, end_exclusive: i64) -> i64 {
        start + self.gen_range_u64(0, (end_exclusive - start) as u64) as i64
    }

    fn gen_bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// A list surface with fixed row height, in content coordinates.
#[derive(Debug)]
pub(crate) struct FakeSurface {
    rows: Vec<RowRepr>,
    header: Vec<HeaderCell>,
    widths: Vec<(usize, u32)>,
    row_height: i64,
    viewport_height: i64,
    scroll: i64,
    header_replacements: usize,
}

impl FakeSurface {
    pub(crate) fn new(row_height: i64, viewport_height: i64) -> Self {
        Self {
            rows: Vec::new(),
            header: Vec::new(),
            widths: Vec::new(),
            row_height,
            viewport_height,
            scroll: 0,
            header_replacements: 0,
        }
    }

    fn max_scroll(&self) -> i64 {
        (self.rows.len() as i64 * self.row_height - self.viewport_height).max(0)
    }

    fn clamp(&mut self) {
        self.scroll = self.scroll.clamp(0, self.max_scroll());
    }

    pub(crate) fn scroll_to(&mut self, y: i64) {
        self.scroll = y;
        self.clamp();
    }

    fn indexes(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.index).collect()
    }

    /// Position and viewport-relative top of the first row intersecting the viewport.
    fn first_visible(&self) -> Option<(usize, i64)> {
        let vp = self.viewport_geometry();
        (0..self.rows.len()).find_map(|pos| {
            let g = self.rendered_row_geometry(pos)?;
            g.intersects(&vp).then(|| (self.rows[pos].index, g.top - vp.top))
        })
    }

    fn row_top(&self, index: usize) -> Option<i64> {
        let pos = self.rows.iter().position(|r| r.index == index)?;
        Some(pos as i64 * self.row_height - self.scroll)
    }
}

impl RenderSurface for FakeSurface {
    fn replace_column_header(&mut self, cells: &[HeaderCell]) {
        self.header = cells.to_vec();
        self.header_replacements += 1;
    }

    fn insert_rows(&mut self, position: usize, rows: Vec<RowRepr>) {
        assert!(position <= self.rows.len(), "insert past the end");
        self.rows.splice(position..position, rows);
    }

    fn remove_rows(&mut self, position: usize, count: usize) {
        assert!(position + count <= self.rows.len(), "remove past the end");
        self.rows.drain(position..position + count);
        self.clamp();
    }

    fn set_column_width(&mut self, column: usize, px: u32) {
        self.widths.retain(|(c, _)| *c != column);
        self.widths.push((column, px));
    }

    fn scroll_by(&mut self, px: i64) {
        self.scroll += px;
        self.clamp();
    }

    fn viewport_geometry(&self) -> ViewportGeometry {
        ViewportGeometry {
            top: self.scroll,
            bottom: self.scroll + self.viewport_height,
            height: self.viewport_height,
        }
    }

    fn rendered_row_geometry(&self, position: usize) -> Option<RowGeometry> {
        (position < self.rows.len()).then(|| {
            let top = position as i64 * self.row_height;
            RowGeometry {
                top,
                bottom: top + self.row_height,
            }
        })
    }
}

pub(crate) fn numbered(n: usize) -> Vec<Row> {
    (0..n).map(|i| json!({"id": i, "name": format!("row {i}")})).collect()
}

pub(crate) fn scenario_options() -> ViewerOptions {
    ViewerOptions::default()
        .with_batch_size(10)
        .with_preload_margin(5)
        .with_overscroll_margin(1000)
}

/// Runs queued requests synchronously and follow-up passes until nothing is left to do.
pub(crate) fn settle<R: RowSource + ?Sized>(viewer: &mut Viewer, source: &mut R, surface: &mut FakeSurface) {
    for _ in 0..10_000 {
        let requests = viewer.drain_requests();
        if requests.is_empty() && !viewer.needs_pass() {
            return;
        }
        for request in requests {
            let response = request.execute(source);
            viewer.apply_response(response, surface);
        }
        if viewer.needs_pass() {
            viewer.reconcile(surface);
        }
    }
    panic!("viewer did not settle");
}

fn assert_consistent(viewer: &Viewer, source: &MemoryRowSource, surface: &FakeSurface) {
    let state = viewer.state();
    assert!(state.is_settled(), "unsettled state {state:?}");
    let rendered = viewer.rendered_range();
    assert_eq!(surface.indexes(), rendered.collect::<Vec<_>>());
    for i in viewer.cached().range() {
        assert_eq!(viewer.row(i), source.rows().get(i), "cached row {i} diverged");
    }
}

#[test]
fn scenario_a_loads_forward_until_end() {
    let mut source = MemoryRowSource::with_id_key(numbered(25)).with_batch_size(10);
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());

    assert!(viewer.needs_pass());
    viewer.reconcile(&mut surface);
    let requests = viewer.drain_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, FetchKind::FromStart);
    for r in requests {
        viewer.apply_response(r.execute(&mut source), &mut surface);
    }
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(viewer.rendered_range(), 0..10);
    assert!(!viewer.loader(Direction::Forward).hit_end());

    let mut kinds = Vec::new();
    for _ in 0..10 {
        surface.scroll_to(i64::MAX);
        viewer.reconcile(&mut surface);
        for _ in 0..100 {
            let requests = viewer.drain_requests();
            if requests.is_empty() && !viewer.needs_pass() {
                break;
            }
            for r in requests {
                kinds.push(r.kind.clone());
                viewer.apply_response(r.execute(&mut source), &mut surface);
            }
            if viewer.needs_pass() {
                viewer.reconcile(&mut surface);
            }
        }
    }

    assert_eq!(
        kinds,
        vec![FetchKind::From { index: 10 }, FetchKind::From { index: 20 }]
    );
    assert_eq!(viewer.rendered_range(), 0..25);
    assert!(viewer.loader(Direction::Forward).hit_end());
    assert_consistent(&viewer, &source, &surface);

    // Nothing further once the end is known.
    viewer.reconcile(&mut surface);
    assert!(!viewer.has_requests());
}

#[test]
fn scenario_b_stale_generation_is_discarded() {
    let old = MemoryRowSource::with_id_key(numbered(30));
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    let mut asc = old.clone();
    settle(&mut viewer, &mut asc, &mut surface);

    let desc_order = OrderSpec::new(Vec::<String>::new(), true);
    let mut desc = old.reordered(desc_order.clone());

    viewer.reset(OrderSpec::default(), Some("id".into()));
    viewer.reset(desc_order.clone(), Some("id".into()));
    viewer.reset(OrderSpec::default(), Some("id".into()));
    assert_eq!(viewer.generation(), Generation(3));
    viewer.reconcile(&mut surface);
    let gen3 = viewer.drain_requests();
    assert_eq!(gen3.len(), 1);
    assert_eq!(gen3[0].generation, Generation(3));
    let gen3_response = gen3[0].execute(&mut asc);

    viewer.reset(desc_order.clone(), Some("id".into()));
    viewer.reconcile(&mut surface);
    let gen4 = viewer.drain_requests();
    assert_eq!(gen4[0].generation, Generation(4));
    let gen4_response = gen4[0].execute(&mut desc);

    // The old rows stay on screen until generation 4 delivers.
    assert_eq!(surface.indexes().len(), 10);
    assert_eq!(surface.rows[0].cells[0], Cell::Value("0".into()));

    assert_eq!(
        viewer.apply_response(gen4_response, &mut surface),
        Applied::Merged
    );
    assert_eq!(viewer.applied_generation(), Generation(4));
    assert_eq!(
        viewer.apply_response(gen3_response, &mut surface),
        Applied::Stale
    );

    assert_eq!(viewer.row(0), Some(&json!({"id": 29, "name": "row 29"})));
    assert_eq!(surface.rows[0].cells[0], Cell::Value("29".into()));
    settle(&mut viewer, &mut desc, &mut surface);
    assert_consistent(&viewer, &desc, &surface);
}

/// A source that answers every seek with the same position and serves rows by index.
#[derive(Debug, Default)]
struct PhonySource {
    seeks: Vec<Value>,
}

impl PhonySource {
    fn row(i: usize) -> Row {
        json!({"id": i})
    }
}

impl RowSource for PhonySource {
    fn rows_from_start(&mut self) -> SourceResult<Page> {
        self.rows_from(0)
    }

    fn rows_from(&mut self, index: usize) -> SourceResult<Page> {
        Ok(Page::new((index..index + 10).map(Self::row).collect(), false))
    }

    fn rows_before(&mut self, index: usize) -> SourceResult<Vec<Row>> {
        Ok((index.saturating_sub(10)..index).map(Self::row).collect())
    }

    fn seek(&mut self, key: &Value) -> SourceResult<SeekResult> {
        self.seeks.push(key.clone());
        Ok(SeekResult {
            offset: 100,
            count: 2,
        })
    }

    fn primary_key(&self) -> Option<&str> {
        Some("id")
    }
}

#[test]
fn scenario_c_seek_resets_window_and_highlights() {
    let mut source = PhonySource::default();
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(viewer.rendered_range(), 0..10);

    let before = viewer.generation();
    viewer.seek(json!("42"));
    assert!(viewer.generation() > before);
    assert!(viewer.is_seeking());

    // Seek first, then the page at the found offset.
    let seek = viewer.drain_requests();
    assert_eq!(seek.len(), 1);
    assert_eq!(seek[0].kind, FetchKind::Seek { key: json!("42") });
    viewer.apply_response(seek[0].execute(&mut source), &mut surface);
    assert!(surface.rows.is_empty());
    assert_eq!(viewer.cached().offset, 100);

    let page = viewer.drain_requests();
    assert_eq!(page[0].kind, FetchKind::From { index: 100 });
    viewer.apply_response(page[0].execute(&mut source), &mut surface);
    assert_eq!(viewer.rendered_range(), 100..110);
    assert_eq!(viewer.highlight(), Some(100..102));
    let highlighted: Vec<_> = surface
        .rows
        .iter()
        .filter(|r| r.highlighted)
        .map(|r| r.index)
        .collect();
    assert_eq!(highlighted, vec![100, 101]);
    assert_eq!(source.seeks, vec![json!("42")]);

    // Earlier rows are filled in and the seeked row keeps its lead-in gap.
    settle(&mut viewer, &mut source, &mut surface);
    assert!(viewer.rendered_range().start < 100);
    let lead_in = viewer.options().seek_lead_in;
    assert_eq!(surface.row_top(100), Some(lead_in));
}

#[test]
fn scenario_d_schema_through_the_viewer() {
    let mut source = MemoryRowSource::new(
        vec![json!({"a": 1, "b": {"c": 2}}), json!({"a": 3})],
        OrderSpec::ascending(["a"]),
        None,
    );
    let mut surface = FakeSurface::new(20, 190);
    let options = scenario_options().with_primary_key(None);
    let mut viewer = Viewer::new(options, OrderSpec::ascending(["a"]));
    settle(&mut viewer, &mut source, &mut surface);

    let labels: Vec<_> = surface.header.iter().map(|h| h.label.as_str()).collect();
    assert_eq!(labels, vec!["a", "b.c"]);
    assert_eq!(surface.header[0].sort, Some(SortIndicator::Ascending));
    assert_eq!(viewer.schema().get(&["a"]).map(|c| c.primitive_count), Some(2));
    assert_eq!(
        viewer.schema().get(&["b", "c"]).map(|c| c.primitive_count),
        Some(1)
    );
    assert_eq!(surface.rows[1].cells, vec![Cell::Value("3".into()), Cell::Missing]);
}

#[test]
fn duplicate_responses_are_ignored() {
    let mut source = MemoryRowSource::with_id_key(numbered(25));
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    viewer.reconcile(&mut surface);
    let request = viewer.drain_requests().remove(0);
    let first = request.execute(&mut source);
    let again = first.clone();
    assert_eq!(viewer.apply_response(first, &mut surface), Applied::Merged);
    assert_eq!(viewer.apply_response(again, &mut surface), Applied::Duplicate);
    assert_eq!(viewer.cached().len(), 10);
    assert_eq!(viewer.schema().get(&["id"]).map(|c| c.primitive_count), Some(10));
}

#[test]
fn new_columns_rebuild_rendered_rows() {
    let mut rows = numbered(10);
    rows.extend((10..20).map(|i| json!({"id": i, "extra": {"x": i}})));
    let mut source = MemoryRowSource::with_id_key(rows);
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(surface.header.len(), 2);

    surface.scroll_to(i64::MAX);
    viewer.reconcile(&mut surface);
    settle(&mut viewer, &mut source, &mut surface);

    // Every row, old and new, now has one cell per column.
    assert_eq!(surface.header.len(), 3);
    assert_eq!(surface.header_replacements, 2);
    assert!(surface.rows.iter().all(|r| r.cells.len() == 3));
    assert_eq!(surface.rows[0].cells[1], Cell::Missing);
}

#[test]
fn partial_pages_are_merged_before_the_error() {
    #[derive(Debug)]
    struct Flaky {
        inner: MemoryRowSource,
        failures: usize,
    }

    impl RowSource for Flaky {
        fn rows_from_start(&mut self) -> SourceResult<Page> {
            self.inner.rows_from_start()
        }

        fn rows_from(&mut self, index: usize) -> SourceResult<Page> {
            if self.failures > 0 {
                self.failures -= 1;
                let page = self.inner.rows_from(index)?;
                return Err(SourceError::Partial {
                    rows: page.rows.into_iter().take(3).collect(),
                    source: Box::new(SourceError::query("connection reset")),
                });
            }
            self.inner.rows_from(index)
        }

        fn rows_before(&mut self, index: usize) -> SourceResult<Vec<Row>> {
            self.inner.rows_before(index)
        }

        fn seek(&mut self, key: &Value) -> SourceResult<SeekResult> {
            self.inner.seek(key)
        }

        fn primary_key(&self) -> Option<&str> {
            self.inner.primary_key()
        }
    }

    let mut source = Flaky {
        inner: MemoryRowSource::with_id_key(numbered(40)),
        failures: 1,
    };
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    surface.scroll_to(i64::MAX);
    viewer.reconcile(&mut surface);
    let request = viewer.drain_requests().remove(0);
    assert_eq!(request.kind, FetchKind::From { index: 10 });
    let outcome = viewer.apply_response(request.execute(&mut source), &mut surface);
    assert_eq!(outcome, Applied::Failed);
    assert_eq!(viewer.cached().range(), 0..13);
    assert_eq!(
        viewer.loader(Direction::Forward).last_error(),
        Some(&SourceError::query("connection reset"))
    );
    assert!(viewer.needs_pass());

    // The next pass continues from the salvaged prefix.
    surface.scroll_to(i64::MAX);
    viewer.reconcile(&mut surface);
    let request = viewer.drain_requests().remove(0);
    assert_eq!(request.kind, FetchKind::From { index: 13 });
}

#[test]
fn query_errors_wait_for_the_next_scroll() {
    #[derive(Debug, Default)]
    struct Down;

    impl RowSource for Down {
        fn rows_from_start(&mut self) -> SourceResult<Page> {
            Err(SourceError::query("offline"))
        }

        fn rows_from(&mut self, _: usize) -> SourceResult<Page> {
            Err(SourceError::query("offline"))
        }

        fn rows_before(&mut self, _: usize) -> SourceResult<Vec<Row>> {
            Err(SourceError::query("offline"))
        }

        fn seek(&mut self, _: &Value) -> SourceResult<SeekResult> {
            Err(SourceError::query("offline"))
        }

        fn primary_key(&self) -> Option<&str> {
            None
        }
    }

    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut Down, &mut surface);
    assert!(!viewer.needs_pass());
    assert!(viewer.loader(Direction::Forward).last_error().is_some());

    viewer.reconcile(&mut surface);
    assert_eq!(viewer.drain_requests().len(), 1);
}

#[test]
fn failed_seek_keeps_the_window() {
    let mut source = MemoryRowSource::with_id_key(numbered(25));
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    viewer.seek(json!(3));
    let request = viewer.drain_requests().remove(0);
    let failed = request.respond(FetchResult::Seek(Err(SourceError::unsupported("seek"))));
    assert_eq!(viewer.apply_response(failed, &mut surface), Applied::Failed);
    assert_eq!(viewer.rendered_range(), 0..10);
    assert_eq!(viewer.applied_generation(), viewer.generation());
    assert!(viewer.last_seek_error().is_some());

    // Back to normal paging.
    surface.scroll_to(i64::MAX);
    viewer.reconcile(&mut surface);
    assert_eq!(
        viewer.drain_requests()[0].kind,
        FetchKind::From { index: 10 }
    );
}

#[test]
fn failed_seek_during_reorder_still_replaces_old_rows() {
    let asc = MemoryRowSource::with_id_key(numbered(30));
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut asc.clone(), &mut surface);
    assert_eq!(viewer.rendered_range(), 0..10);

    let desc_order = OrderSpec::new(Vec::<String>::new(), true);
    let mut desc = asc.reordered(desc_order.clone());
    viewer.reset(desc_order, Some("id".into()));
    viewer.reconcile(&mut surface);
    // The first page of the new order never arrives.
    assert_eq!(viewer.drain_requests().len(), 1);

    viewer.seek(json!(5));
    let request = viewer.drain_requests().remove(0);
    let failed = request.respond(FetchResult::Seek(Err(SourceError::query("timeout"))));
    assert_eq!(viewer.apply_response(failed, &mut surface), Applied::Failed);
    assert!(viewer.applied_generation() < viewer.generation());
    assert!(viewer.needs_pass());

    settle(&mut viewer, &mut desc, &mut surface);
    assert_eq!(viewer.applied_generation(), viewer.generation());
    assert_eq!(viewer.row(0), Some(&json!({"id": 29, "name": "row 29"})));
    assert_consistent(&viewer, &desc, &surface);

    surface.scroll_to(i64::MAX);
    viewer.reconcile(&mut surface);
    settle(&mut viewer, &mut desc, &mut surface);
    assert!(viewer.cached().len() > 10);
    assert_consistent(&viewer, &desc, &surface);
}

/// Serves rows from an in-memory source but reports every seek far past its data.
#[derive(Debug)]
struct OvershootingSource {
    inner: MemoryRowSource,
}

impl RowSource for OvershootingSource {
    fn rows_from_start(&mut self) -> SourceResult<Page> {
        self.inner.rows_from_start()
    }

    fn rows_from(&mut self, index: usize) -> SourceResult<Page> {
        self.inner.rows_from(index)
    }

    fn rows_before(&mut self, index: usize) -> SourceResult<Vec<Row>> {
        self.inner.rows_before(index)
    }

    fn seek(&mut self, _: &Value) -> SourceResult<SeekResult> {
        Ok(SeekResult {
            offset: 100,
            count: 0,
        })
    }

    fn primary_key(&self) -> Option<&str> {
        self.inner.primary_key()
    }
}

#[test]
fn seek_offset_beyond_the_data_falls_back_to_the_start() {
    let mut source = OvershootingSource {
        inner: MemoryRowSource::with_id_key(numbered(25)),
    };
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    viewer.seek(json!(7));
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(viewer.cached().offset, 0);
    assert_eq!(viewer.rendered_range().start, 0);
    assert!(!viewer.rendered_range().is_empty());
    assert_consistent(&viewer, &source.inner, &surface);
}

#[test]
fn seek_past_the_end_loads_backward() {
    let mut source = MemoryRowSource::with_id_key(numbered(25));
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    viewer.seek(json!(1000));
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(viewer.highlight(), None);
    assert_eq!(viewer.cached().end(), 25);
    assert!(!viewer.rendered_range().is_empty());
    assert_eq!(viewer.rendered_range().end, 25);
    assert_consistent(&viewer, &source, &surface);
}

#[test]
fn unsupported_backward_fetch_parks_the_loader() {
    let mut source = MemoryRowSource::with_id_key(numbered(400)).with_forward_only(true);
    let mut surface = FakeSurface::new(20, 190);
    let options = scenario_options().with_overscroll_margin(200);
    let mut viewer = Viewer::new(options, OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    for _ in 0..40 {
        surface.scroll_by(150);
        viewer.reconcile(&mut surface);
        settle(&mut viewer, &mut source, &mut surface);
    }
    assert!(viewer.cached().offset > 0, "front rows were never evicted");

    for _ in 0..40 {
        surface.scroll_by(-150);
        viewer.reconcile(&mut surface);
        settle(&mut viewer, &mut source, &mut surface);
    }
    let backward = viewer.loader(Direction::Backward);
    assert!(backward.is_blocked());
    assert!(backward.last_error().is_some_and(SourceError::is_unsupported));
    viewer.reconcile(&mut surface);
    assert!(
        viewer
            .drain_requests()
            .iter()
            .all(|r| !matches!(r.kind, FetchKind::Before { .. }))
    );
}

#[test]
fn appended_rows_reopen_forward_loading() {
    let mut source = MemoryRowSource::with_id_key(numbered(5));
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);
    assert!(viewer.loader(Direction::Forward).hit_end());
    assert_eq!(viewer.rendered_range(), 0..5);

    let lowest = source.insert((5..12).map(|i| json!({"id": i})));
    assert_eq!(lowest, Some(5));
    viewer.notify_appended();
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(viewer.rendered_range(), 0..12);
}

#[test]
fn column_width_and_display_survive_reorder() {
    let rows: Vec<Row> = (0..15)
        .map(|i| json!({"id": i, "meta": {"x": i, "y": -i}}))
        .collect();
    let mut source = MemoryRowSource::with_id_key(rows);
    let mut surface = FakeSurface::new(20, 190);
    let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);
    assert_eq!(surface.header.len(), 3);

    assert!(viewer.set_column_width(&mut surface, 1, 120));
    assert!(!viewer.set_column_width(&mut surface, 9, 10));
    assert_eq!(surface.widths, vec![(1, 120)]);

    let state = viewer.toggle_column_display(&mut surface, &["meta"]);
    assert_eq!(state, Some(DisplayState::Collapsed));
    let labels: Vec<_> = surface.header.iter().map(|h| h.label.clone()).collect();
    assert_eq!(labels, vec!["id", "meta"]);
    assert!(surface.header[1].collapsed);
    assert!(surface.rows.iter().all(|r| r.cells[1] == Cell::Nested));

    let order = OrderSpec::default().toggled(&[], Some("id"));
    let mut reordered = source.reordered(order.clone());
    viewer.reset(order, Some("id".into()));
    settle(&mut viewer, &mut reordered, &mut surface);
    assert_eq!(surface.header.len(), 2);
    assert_eq!(surface.header[0].sort, Some(SortIndicator::Descending));
    assert_eq!(surface.rows[0].index, 0);
    assert_eq!(surface.rows[0].cells[0], Cell::Value("14".into()));
    // Rows seen again under the new order are counted again.
    assert_eq!(viewer.schema().get(&["id"]).map(|c| c.primitive_count), Some(20));
}

#[test]
fn reorder_can_forget_the_schema() {
    let mut source = MemoryRowSource::with_id_key(numbered(10));
    let mut surface = FakeSurface::new(20, 190);
    let options = scenario_options().with_reset_schema_on_reorder(true);
    let mut viewer = Viewer::new(options, OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    let order = OrderSpec::ascending(["name"]);
    let mut reordered = source.reordered(order.clone());
    viewer.reset(order, Some("id".into()));
    settle(&mut viewer, &mut reordered, &mut surface);
    assert_eq!(viewer.schema().get(&["id"]).map(|c| c.primitive_count), Some(10));
    assert_eq!(surface.header[1].sort, Some(SortIndicator::Ascending));
}

#[test]
fn visible_row_stays_put_across_loads_and_evictions() {
    let mut source = MemoryRowSource::with_id_key(numbered(2_000));
    let mut surface = FakeSurface::new(20, 190);
    let options = scenario_options()
        .with_preload_margin(60)
        .with_overscroll_margin(300);
    let mut viewer = Viewer::new(options, OrderSpec::default());
    settle(&mut viewer, &mut source, &mut surface);

    let mut rng = Lcg::new(7);
    let mut max_end = 0;
    for step in 0..400 {
        let delta = if step < 250 {
            rng.gen_range_i64(-100, 300)
        } else {
            rng.gen_range_i64(-300, 100)
        };
        surface.scroll_by(delta);
        let before = surface.first_visible();
        viewer.reconcile(&mut surface);
        settle(&mut viewer, &mut source, &mut surface);
        let after = surface.first_visible();
        if let (Some((index, top)), Some(_)) = (before, after) {
            assert_eq!(
                surface.row_top(index),
                Some(top),
                "row {index} moved at step {step}"
            );
        }
        assert_consistent(&viewer, &source, &surface);
        assert!(viewer.rendered_range().len() <= 120, "window grew unbounded");
        max_end = max_end.max(viewer.cached().end());
    }

    // Evicted rows fetched again are not counted twice.
    assert_eq!(
        viewer.schema().get(&["id"]).map(|c| c.primitive_count),
        Some(max_end as u64)
    );
}

/// Turns a successful response into a failure. Forward pages may keep a prefix of their rows.
fn failed(response: FetchResponse, rng: &mut Lcg) -> FetchResponse {
    let error = SourceError::query("connection reset");
    let result = match response.result {
        FetchResult::Page(Ok(page)) if rng.gen_bool() => {
            let keep = rng.gen_range_usize(0, page.rows.len() + 1);
            FetchResult::Page(Err(SourceError::Partial {
                rows: page.rows[..keep].to_vec(),
                source: Box::new(error),
            }))
        }
        FetchResult::Page(_) => FetchResult::Page(Err(error)),
        FetchResult::Before(_) => FetchResult::Before(Err(error)),
        FetchResult::Seek(_) => FetchResult::Seek(Err(error)),
    };
    FetchResponse { result, ..response }
}

#[test]
fn window_invariants_hold_under_random_resets_and_late_responses() {
    let base = MemoryRowSource::with_id_key(numbered(300));
    let orders = [
        OrderSpec::default(),
        OrderSpec::new(Vec::<String>::new(), true),
        OrderSpec::ascending(["name"]),
    ];
    let mut rng = Lcg::new(0x5eed);

    for _round in 0..20 {
        let mut surface = FakeSurface::new(rng.gen_range_usize(10, 40) as i64, 200);
        let mut viewer = Viewer::new(scenario_options(), OrderSpec::default());
        let mut source = base.clone();
        let mut held: Vec<FetchResponse> = Vec::new();

        for _ in 0..60 {
            match rng.gen_range_u64(0, 5) {
                0 => {
                    let order = orders[rng.gen_range_usize(0, orders.len())].clone();
                    source = base.reordered(order.clone());
                    viewer.reset(order, Some("id".into()));
                }
                1 => {
                    let id = rng.gen_range_usize(0, 320);
                    viewer.seek(json!(id));
                }
                2 => surface.scroll_by(rng.gen_range_i64(-400, 400)),
                _ => {}
            }
            viewer.reconcile(&mut surface);
            for request in viewer.drain_requests() {
                let response = request.execute(&mut source);
                let response = if rng.gen_range_u64(0, 4) == 0 {
                    failed(response, &mut rng)
                } else {
                    response
                };
                held.push(response);
            }
            while !held.is_empty() && rng.gen_bool() {
                let response = held.swap_remove(rng.gen_range_usize(0, held.len()));
                viewer.apply_response(response, &mut surface);
            }
            let state = viewer.state();
            assert!(state.applied <= state.generation);
            assert!(viewer.cached().contains_range(&viewer.rendered_range()));
        }

        for response in held.drain(..) {
            viewer.apply_response(response, &mut surface);
        }
        // Failed fetches wait for the next viewport change.
        viewer.reconcile(&mut surface);
        settle(&mut viewer, &mut source, &mut surface);
        assert_eq!(viewer.applied_generation(), viewer.generation());
        assert_eq!(viewer.order(), source.order());
        assert_consistent(&viewer, &source, &surface);
    }
}
