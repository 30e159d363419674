// Example: a scripted session through the controller and a headless list surface.
use rowview::{MemoryRowSource, OrderSpec, RenderSurface, ViewerOptions};
use rowview_adapter::{Controller, ListSurface};
use serde_json::json;

fn print_screen(title: &str, surface: &ListSurface) {
    let header: Vec<_> = surface.header().iter().map(|h| h.label.as_str()).collect();
    println!("== {title} (scroll={}) {header:?}", surface.scroll_offset());
    for line in surface.render_text() {
        println!("{line}");
    }
}

fn main() {
    let cities = ["Oslo", "Lima", "Pune", "Kyiv"];
    let rows = (0..5_000)
        .map(|i| json!({"id": i, "city": cities[i % 4], "score": (i * 7919) % 1000}))
        .collect();
    let base = MemoryRowSource::with_id_key(rows);
    let mut surface = ListSurface::new(200);
    let mut c = Controller::new(ViewerOptions::default(), OrderSpec::default(), |order| {
        base.reordered(order.clone())
    });

    c.pump(&mut surface);
    print_screen("initial", &surface);

    for _ in 0..20 {
        surface.scroll_by(250);
        c.on_scroll(&mut surface);
    }
    print_screen("scrolled", &surface);
    println!("state={:?}", c.viewer().state());

    // Double-activate the "score" header.
    let score = c
        .viewer()
        .columns()
        .iter()
        .position(|col| col.label() == "score");
    if let Some(column) = score {
        c.on_header_activated(column, &mut surface);
        print_screen("sorted by score", &surface);
    }

    match c.submit_seek_input("500", &mut surface) {
        Ok(id) => println!("seek request {}", id.0),
        Err(err) => println!("seek rejected: {err}"),
    }
    print_screen("seeked to score 500", &surface);

    if let Err(err) = c.submit_seek_input("[1,", &mut surface) {
        println!("seek rejected: {err}");
    }
}
