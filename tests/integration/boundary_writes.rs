#![allow(missing_docs)]

mod common;

use canopy::{
    admin, BoundaryIndexed, BoundaryMaintenance, NewCategory, NodeId, Strategy, TreeError,
    TreeLoader, TreeOptions,
};
use common::{
    assert_strategies_agree, bounds_of, child_ids, memory_store, seed, seed_indexed,
};

/// 1 [2 [4, 5], 3]
fn small_catalog() -> canopy::CategoryStore {
    let mut store = memory_store();
    seed_indexed(
        &mut store,
        &[
            (1, None, 0),
            (2, Some(1), 0),
            (3, Some(1), 1),
            (4, Some(2), 0),
            (5, Some(2), 1),
        ],
    );
    store
}

fn assert_clean(store: &canopy::CategoryStore) {
    let report = admin::verify(store).unwrap();
    assert!(report.findings.is_empty(), "{:?}", report.findings);
    assert_strategies_agree(store);
}

#[test]
fn insert_appends_after_existing_children() {
    let mut store = small_catalog();
    let boundary = BoundaryIndexed::new();
    let six = boundary
        .insert(&mut store, &NewCategory::new("Late Child"), Some(NodeId(2)))
        .unwrap();
    let tree = assert_strategies_agree(&store);
    assert_eq!(child_ids(&tree, 2), vec![4, 5, six.0]);
    assert_eq!(bounds_of(&store, six.0), Some((7, 8)));
    assert_eq!(bounds_of(&store, 1), Some((1, 12)));
    assert_clean(&store);

    let root = boundary
        .insert(&mut store, &NewCategory::new("Second Root"), None)
        .unwrap();
    assert_eq!(bounds_of(&store, root.0), Some((13, 14)));
    assert_clean(&store);
}

#[test]
fn insert_rejects_missing_parent_and_duplicate_slug() {
    let mut store = small_catalog();
    let boundary = BoundaryIndexed::new();
    let err = boundary
        .insert(&mut store, &NewCategory::new("Orphan"), Some(NodeId(42)))
        .unwrap_err();
    assert!(matches!(err, TreeError::InvalidParent(NodeId(42))));

    boundary
        .insert(&mut store, &NewCategory::new("Brakes"), Some(NodeId(3)))
        .unwrap();
    let err = boundary
        .insert(&mut store, &NewCategory::new("BRAKES!"), Some(NodeId(3)))
        .unwrap_err();
    assert!(matches!(err, TreeError::DuplicateSlug(ref slug) if slug == "brakes"));

    let err = boundary
        .insert(&mut store, &NewCategory::new("   "), None)
        .unwrap_err();
    assert!(matches!(err, TreeError::InvalidArgument(_)));

    assert_eq!(store.len().unwrap(), 6);
    assert_clean(&store);
}

#[test]
fn move_right_into_later_sibling() {
    let mut store = small_catalog();
    BoundaryIndexed::new()
        .move_node(&mut store, NodeId(2), Some(NodeId(3)))
        .unwrap();

    assert_eq!(bounds_of(&store, 1), Some((1, 10)));
    assert_eq!(bounds_of(&store, 3), Some((2, 9)));
    assert_eq!(bounds_of(&store, 2), Some((3, 8)));
    assert_eq!(bounds_of(&store, 4), Some((4, 5)));
    assert_eq!(bounds_of(&store, 5), Some((6, 7)));

    let tree = assert_strategies_agree(&store);
    assert_eq!(child_ids(&tree, 1), vec![3]);
    assert_eq!(child_ids(&tree, 3), vec![2]);
    assert_eq!(tree.find(NodeId(5)).map(|n| n.depth), Some(3));
    assert_clean(&store);
}

#[test]
fn move_left_and_to_root() {
    let mut store = small_catalog();
    let boundary = BoundaryIndexed::new();
    boundary
        .move_node(&mut store, NodeId(3), Some(NodeId(2)))
        .unwrap();
    let tree = assert_strategies_agree(&store);
    assert_eq!(child_ids(&tree, 2), vec![4, 5, 3]);
    assert_clean(&store);

    boundary.move_node(&mut store, NodeId(4), None).unwrap();
    let tree = assert_strategies_agree(&store);
    let roots: Vec<i64> = tree.roots().iter().map(|n| n.id().0).collect();
    assert_eq!(roots, vec![1, 4]);
    assert_eq!(store.get(NodeId(4)).unwrap().unwrap().position, 1);
    assert_clean(&store);
}

#[test]
fn moving_roots_to_the_root_level_keeps_bounds_valid() {
    let boundary = BoundaryIndexed::new();

    // the moved subtree is the whole relation
    let mut store = small_catalog();
    boundary.move_node(&mut store, NodeId(1), None).unwrap();
    assert_eq!(bounds_of(&store, 1), Some((1, 10)));
    assert_eq!(bounds_of(&store, 4), Some((3, 4)));
    assert_clean(&store);
    assert_eq!(boundary.reindex(&mut store).unwrap().changed, 0);

    let mut store = memory_store();
    let only = boundary
        .insert(&mut store, &NewCategory::new("Only Root"), None)
        .unwrap();
    boundary.move_node(&mut store, only, None).unwrap();
    assert_eq!(bounds_of(&store, only.0), Some((1, 2)));
    assert_clean(&store);

    // first of two roots, then the last one
    let mut store = small_catalog();
    let second = boundary
        .insert(&mut store, &NewCategory::new("Second Root"), None)
        .unwrap();
    assert_eq!(bounds_of(&store, second.0), Some((11, 12)));
    boundary.move_node(&mut store, NodeId(1), None).unwrap();
    assert_eq!(bounds_of(&store, second.0), Some((1, 2)));
    assert_eq!(bounds_of(&store, 1), Some((3, 12)));
    assert_clean(&store);

    boundary.move_node(&mut store, NodeId(1), None).unwrap();
    assert_eq!(bounds_of(&store, 1), Some((3, 12)));
    let tree = assert_strategies_agree(&store);
    let roots: Vec<i64> = tree.roots().iter().map(|n| n.id().0).collect();
    assert_eq!(roots, vec![second.0, 1]);
    assert_clean(&store);
    assert_eq!(boundary.reindex(&mut store).unwrap().changed, 0);
}

#[test]
fn move_into_own_subtree_is_refused_without_changes() {
    let mut store = small_catalog();
    let before = assert_strategies_agree(&store);
    let boundary = BoundaryIndexed::new();

    for target in [2, 4, 5] {
        let err = boundary
            .move_node(&mut store, NodeId(2), Some(NodeId(target)))
            .unwrap_err();
        assert!(
            matches!(err, TreeError::CycleDetected { node: NodeId(2), .. }),
            "target {target}: {err}"
        );
    }
    let err = boundary
        .move_node(&mut store, NodeId(2), Some(NodeId(99)))
        .unwrap_err();
    assert!(matches!(err, TreeError::InvalidParent(NodeId(99))));
    let err = boundary.move_node(&mut store, NodeId(77), None).unwrap_err();
    assert!(matches!(err, TreeError::NodeNotFound(NodeId(77))));

    assert_eq!(assert_strategies_agree(&store), before);
}

#[test]
fn delete_leaf_and_missing_node() {
    let mut store = small_catalog();
    let boundary = BoundaryIndexed::new();
    assert_eq!(boundary.delete(&mut store, NodeId(4), false).unwrap(), 1);
    assert_eq!(bounds_of(&store, 5), Some((3, 4)));
    assert_eq!(bounds_of(&store, 1), Some((1, 8)));
    assert_clean(&store);

    let err = boundary.delete(&mut store, NodeId(4), false).unwrap_err();
    assert!(matches!(err, TreeError::NodeNotFound(NodeId(4))));
}

#[test]
fn delete_and_reparent_promotes_children_in_place() {
    let mut store = small_catalog();
    BoundaryIndexed::new()
        .delete_and_reparent(&mut store, NodeId(2))
        .unwrap();

    let tree = assert_strategies_agree(&store);
    assert_eq!(child_ids(&tree, 1), vec![4, 5, 3]);
    assert_eq!(bounds_of(&store, 1), Some((1, 8)));
    assert_eq!(bounds_of(&store, 4), Some((2, 3)));
    assert_eq!(bounds_of(&store, 3), Some((6, 7)));
    let positions: Vec<i64> = [4, 5, 3]
        .iter()
        .map(|&id| store.get(NodeId(id)).unwrap().unwrap().position)
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_clean(&store);

    // a root's children become roots
    BoundaryIndexed::new()
        .delete_and_reparent(&mut store, NodeId(1))
        .unwrap();
    let tree = assert_strategies_agree(&store);
    assert_eq!(tree.roots().len(), 3);
    assert_clean(&store);
}

#[test]
fn rename_keeps_bounds() {
    let mut store = small_catalog();
    let boundary = BoundaryIndexed::new();
    let before = bounds_of(&store, 3);
    boundary
        .rename(
            &mut store,
            NodeId(3),
            &NewCategory::new("Body Parts").with_slug("body"),
        )
        .unwrap();
    let renamed = store.get(NodeId(3)).unwrap().unwrap();
    assert_eq!(renamed.name, "Body Parts");
    assert_eq!(renamed.slug, "body");
    assert_eq!(bounds_of(&store, 3), before);

    let taken = store.get(NodeId(2)).unwrap().unwrap().slug;
    let err = boundary
        .rename(&mut store, NodeId(3), &NewCategory::new("x").with_slug(taken))
        .unwrap_err();
    assert!(matches!(err, TreeError::DuplicateSlug(_)));
    let err = boundary
        .rename(&mut store, NodeId(50), &NewCategory::new("x"))
        .unwrap_err();
    assert!(matches!(err, TreeError::NodeNotFound(NodeId(50))));
}

#[test]
fn incremental_writes_need_an_indexed_relation() {
    let mut store = memory_store();
    seed(&mut store, &[(1, None, 0)]);
    let err = BoundaryIndexed::new()
        .insert(&mut store, &NewCategory::new("Child"), Some(NodeId(1)))
        .unwrap_err();
    assert!(matches!(err, TreeError::InconsistentTree(ref msg) if msg.contains("reindex")));
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn deferred_maintenance_defers_to_reindex() {
    let options = TreeOptions::default().maintenance(BoundaryMaintenance::Deferred);
    let mut store = small_catalog();
    let boundary = BoundaryIndexed::from_options(&options);

    let six = boundary
        .insert(&mut store, &NewCategory::new("Unindexed"), Some(NodeId(3)))
        .unwrap();
    assert_eq!(bounds_of(&store, six.0), None);
    let err = boundary.load_tree(&store).unwrap_err();
    assert!(matches!(err, TreeError::InconsistentTree(_)));

    // the other strategies do not read bounds
    let closure = Strategy::RecursiveClosure.loader(&options).load_tree(&store).unwrap();
    assert_eq!(child_ids(&closure, 3), vec![six.0]);

    let err = boundary
        .move_node(&mut store, NodeId(1), Some(six))
        .unwrap_err();
    assert!(matches!(err, TreeError::CycleDetected { .. }));

    boundary.move_node(&mut store, NodeId(5), Some(six)).unwrap();
    assert_eq!(bounds_of(&store, 1), None);

    let report = boundary.reindex(&mut store).unwrap();
    assert_eq!(report.nodes, 6);
    assert_eq!(report.changed, 6);
    let tree = assert_strategies_agree(&store);
    assert_eq!(child_ids(&tree, six.0), vec![5]);

    // cascading delete leaves correctly nested gaps
    assert_eq!(boundary.delete(&mut store, NodeId(2), true).unwrap(), 2);
    let report = admin::verify(&store).unwrap();
    assert!(report.success);
    assert_eq!(
        report
            .findings_at(admin::VerifySeverity::Warning)
            .count(),
        1
    );
    assert_strategies_agree(&store);
}

#[test]
fn ancestors_and_subtrees() {
    let store = small_catalog();
    let boundary = BoundaryIndexed::new();
    let chain: Vec<i64> = boundary
        .ancestors(&store, NodeId(5))
        .unwrap()
        .iter()
        .map(|c| c.id.0)
        .collect();
    assert_eq!(chain, vec![1, 2]);
    assert!(boundary.ancestors(&store, NodeId(1)).unwrap().is_empty());

    let options = TreeOptions::default();
    for strategy in Strategy::ALL {
        let loader = strategy.loader(&options);
        let subtree = loader.load_subtree(&store, NodeId(2)).unwrap();
        assert_eq!(subtree.len(), 3, "{strategy}");
        assert_eq!(subtree.roots()[0].id(), NodeId(2));
        assert_eq!(subtree.roots()[0].depth, 0);
        assert_eq!(child_ids(&subtree, 2), vec![4, 5]);

        let err = loader.load_subtree(&store, NodeId(404)).unwrap_err();
        assert!(matches!(err, TreeError::NodeNotFound(NodeId(404))), "{strategy}");
    }
}
