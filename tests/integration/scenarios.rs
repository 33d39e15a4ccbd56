#![allow(missing_docs)]

mod common;

use canopy::{
    admin, BoundaryIndexed, NewCategory, NodeId, Strategy, TreeError, TreeLoader, TreeOptions,
};
use common::{assert_strategies_agree, balanced_rows, bounds_of, memory_store, seed_indexed};

#[test]
fn three_level_chain_gets_nested_bounds() {
    let mut store = memory_store();
    let boundary = BoundaryIndexed::new();
    let a = boundary
        .insert(&mut store, &NewCategory::new("Auto Parts"), None)
        .unwrap();
    let b = boundary
        .insert(&mut store, &NewCategory::new("Engine Parts"), Some(a))
        .unwrap();
    let c = boundary
        .insert(&mut store, &NewCategory::new("Engine Bearings"), Some(b))
        .unwrap();

    assert_eq!(bounds_of(&store, a.0), Some((1, 6)));
    assert_eq!(bounds_of(&store, b.0), Some((2, 5)));
    assert_eq!(bounds_of(&store, c.0), Some((3, 4)));

    let tree = assert_strategies_agree(&store);
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.path_to(c), Some(vec![a, b, c]));

    // a full reindex lands on the same numbering
    let report = boundary.reindex(&mut store).unwrap();
    assert_eq!(report.changed, 0);
    assert_eq!(report.max_depth, 2);
}

#[test]
fn deferred_chain_is_numbered_by_reindex() {
    let options = TreeOptions::bulk_load();
    let mut store = memory_store();
    let boundary = BoundaryIndexed::from_options(&options);
    let r1 = boundary
        .insert(&mut store, &NewCategory::new("Auto Parts"), None)
        .unwrap();
    let c1 = boundary
        .insert(&mut store, &NewCategory::new("Engine Parts"), Some(r1))
        .unwrap();
    let g1 = boundary
        .insert(&mut store, &NewCategory::new("Engine Bearings"), Some(c1))
        .unwrap();
    assert_eq!(bounds_of(&store, r1.0), None);

    let report = boundary.reindex(&mut store).unwrap();
    assert_eq!(report.nodes, 3);
    assert_eq!(report.roots, 1);
    assert_eq!(report.changed, 3);
    assert_eq!(bounds_of(&store, r1.0), Some((1, 6)));
    assert_eq!(bounds_of(&store, c1.0), Some((2, 5)));
    assert_eq!(bounds_of(&store, g1.0), Some((3, 4)));

    let again = boundary.reindex(&mut store).unwrap();
    assert_eq!(again.changed, 0);
    assert_eq!(bounds_of(&store, r1.0), Some((1, 6)));
    assert_eq!(store.get_by_slug("engine-bearings").unwrap().map(|c| c.id), Some(g1));
}

#[test]
fn thousand_node_tree_round_trips() {
    let mut store = memory_store();
    let rows = balanced_rows(&[9, 10, 10]);
    assert_eq!(rows.len(), 1000);
    seed_indexed(&mut store, &rows);

    let options = TreeOptions::default();
    let mut expected = None;
    for strategy in Strategy::ALL {
        let report = strategy.loader(&options).load_profiled(&store).unwrap();
        let round_trips = match strategy {
            Strategy::AdjacencyRecursive => 5,
            Strategy::RecursiveClosure | Strategy::BoundaryIndexed => 1,
        };
        assert_eq!(report.round_trips, round_trips, "{strategy}");
        assert_eq!(report.rows, 1000, "{strategy}");
        assert_eq!(report.tree.len(), 1000, "{strategy}");
        assert_eq!(report.tree.height(), 4, "{strategy}");

        let shape = report.tree.shape();
        match &expected {
            None => expected = Some(shape),
            Some(expected) => assert_eq!(expected, &shape, "{strategy}"),
        }
    }
}

#[test]
fn restrict_then_cascade_delete() {
    let mut store = memory_store();
    seed_indexed(&mut store, &[(1, None, 0), (2, Some(1), 0), (3, None, 1)]);
    assert_eq!(bounds_of(&store, 3), Some((5, 6)));

    let boundary = BoundaryIndexed::new();
    let err = boundary.delete(&mut store, NodeId(1), false).unwrap_err();
    assert!(matches!(
        err,
        TreeError::HasChildren { node: NodeId(1), children: 1 }
    ));
    assert_eq!(store.len().unwrap(), 3);

    let removed = boundary.delete(&mut store, NodeId(1), true).unwrap();
    assert_eq!(removed, 2);
    assert!(store.get(NodeId(1)).unwrap().is_none());
    assert!(store.get(NodeId(2)).unwrap().is_none());
    // the gap closed
    assert_eq!(bounds_of(&store, 3), Some((1, 2)));
    admin::verify(&store).unwrap().into_result().unwrap();
    assert_eq!(assert_strategies_agree(&store).len(), 1);
}

#[test]
fn empty_relation_loads_empty_tree_unless_strict() {
    let store = memory_store();
    for strategy in Strategy::ALL {
        let lenient = strategy.loader(&TreeOptions::default());
        assert!(lenient.load_tree(&store).unwrap().is_empty(), "{strategy}");

        let strict = strategy.loader(&TreeOptions::default().strict(true));
        assert!(
            matches!(strict.load_tree(&store), Err(TreeError::EmptyResult)),
            "{strategy}"
        );
    }
}
