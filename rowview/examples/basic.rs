// Example: drive a viewer by hand against an in-memory source.
use rowview::{
    HeaderCell, MemoryRowSource, OrderSpec, RenderSurface, RowGeometry, RowRepr, Viewer,
    ViewerOptions, ViewportGeometry,
};
use serde_json::json;

/// Fixed 1-line rows in a 12-line terminal.
#[derive(Default)]
struct Lines {
    header: Vec<String>,
    rows: Vec<RowRepr>,
    scroll: i64,
}

impl RenderSurface for Lines {
    fn replace_column_header(&mut self, cells: &[HeaderCell]) {
        self.header = cells.iter().map(|c| c.label.clone()).collect();
    }

    fn insert_rows(&mut self, position: usize, rows: Vec<RowRepr>) {
        self.rows.splice(position..position, rows);
    }

    fn remove_rows(&mut self, position: usize, count: usize) {
        self.rows.drain(position..position + count);
    }

    fn set_column_width(&mut self, _column: usize, _px: u32) {}

    fn scroll_by(&mut self, px: i64) {
        self.scroll = (self.scroll + px).max(0);
    }

    fn viewport_geometry(&self) -> ViewportGeometry {
        ViewportGeometry {
            top: self.scroll,
            bottom: self.scroll + 12,
            height: 12,
        }
    }

    fn rendered_row_geometry(&self, position: usize) -> Option<RowGeometry> {
        (position < self.rows.len()).then(|| RowGeometry {
            top: position as i64,
            bottom: position as i64 + 1,
        })
    }
}

fn main() {
    let rows = (0..1_000)
        .map(|i| json!({"id": i, "user": {"name": format!("user{i}"), "age": 20 + i % 50}}))
        .collect();
    let mut source = MemoryRowSource::with_id_key(rows);
    let options = ViewerOptions::default()
        .with_preload_margin(4)
        .with_overscroll_margin(40);
    let mut viewer = Viewer::new(options, OrderSpec::default());
    let mut surface = Lines::default();

    // Each event: one pass, then run whatever it asked for until it settles.
    let mut settle = |viewer: &mut Viewer, surface: &mut Lines| {
        while viewer.needs_pass() || viewer.has_requests() {
            for request in viewer.drain_requests() {
                let response = request.execute(&mut source);
                viewer.apply_response(response, surface);
            }
            if viewer.needs_pass() {
                viewer.reconcile(surface);
            }
        }
    };

    settle(&mut viewer, &mut surface);
    println!("header={:?}", surface.header);
    println!("state={:?}", viewer.state());

    for _ in 0..30 {
        surface.scroll_by(5);
        viewer.reconcile(&mut surface);
        settle(&mut viewer, &mut surface);
    }
    println!("after scrolling: state={:?}", viewer.state());

    viewer.seek(json!(500));
    settle(&mut viewer, &mut surface);
    let first = &surface.rows[0];
    println!(
        "after seek: rendered={:?} highlight={:?} first_row={} {:?}",
        viewer.rendered_range(),
        viewer.highlight(),
        first.index,
        first.cells.iter().map(|c| c.text()).collect::<Vec<_>>()
    );
}
