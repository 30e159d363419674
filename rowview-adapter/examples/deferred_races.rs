// Example: hold fetches back and resolve them out of order.
use rowview::{MemoryRowSource, OrderSpec, ViewerOptions};
use rowview_adapter::{Controller, Dispatch, ListSurface};
use serde_json::json;

fn main() {
    let rows = (0..300).map(|i| json!({"id": i, "even": i % 2 == 0})).collect();
    let base = MemoryRowSource::with_id_key(rows);
    let mut surface = ListSurface::new(100);
    let mut c = Controller::new(ViewerOptions::default(), OrderSpec::default(), |order| {
        base.reordered(order.clone())
    })
    .with_dispatch(Dispatch::Deferred);

    c.pump(&mut surface);
    c.resolve_all(&mut surface);
    println!("loaded rows={:?}", c.viewer().rendered_range());

    // Two re-sorts in a row; their first pages race.
    c.set_order(OrderSpec::new(Vec::<String>::new(), true), &mut surface);
    c.set_order(OrderSpec::ascending(["even"]), &mut surface);
    for request in c.queued() {
        println!(
            "held: id={} generation={} {:?}",
            request.id.0, request.generation.0, request.kind
        );
    }

    while let Some(applied) = c.resolve_latest(&mut surface) {
        println!("resolved newest: {applied:?}");
    }
    let first = surface
        .rows()
        .first()
        .map(|r| r.cells.iter().map(|c| c.text()).collect::<Vec<_>>());
    println!("first row={first:?} generation={:?}", c.viewer().generation());
}
