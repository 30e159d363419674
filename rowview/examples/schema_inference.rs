// Example: watch the column tree grow as differently shaped rows arrive.
use rowview::ColumnTree;
use serde_json::json;

fn main() {
    let mut tree = ColumnTree::new();
    let batches = [
        vec![json!({"id": 1, "a": 1, "b": {"c": 2}}), json!({"id": 2, "a": 3})],
        vec![
            json!({"id": 3, "b": {"c": 4, "d": [1, 2]}}),
            json!({"id": 4, "b": "flat"}),
        ],
    ];

    for (i, batch) in batches.iter().enumerate() {
        tree.observe(batch, Some("id"));
        let labels: Vec<_> = tree.columns().iter().map(|c| c.label()).collect();
        println!("after batch {i}: columns={labels:?}");
    }

    let paths: [&[&str]; 4] = [&["a"], &["b"], &["b", "c"], &["b", "d"]];
    for path in paths {
        if let Some(info) = tree.get(path) {
            println!(
                "{:?}: primitive={} object={} occurrence={:.2}",
                path,
                info.primitive_count,
                info.object_count,
                info.occurrence()
            );
        }
    }

    tree.toggle_display(&["b"]);
    let labels: Vec<_> = tree.columns().iter().map(|c| c.label()).collect();
    println!("with b collapsed: columns={labels:?}");
}
