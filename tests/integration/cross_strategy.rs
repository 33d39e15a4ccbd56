#![allow(missing_docs)]

mod common;

use canopy::{NodeId, Strategy, TreeLoader, TreeOptions};
use common::{assert_strategies_agree, child_ids, ids, memory_store, seed_indexed};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[test]
fn positions_order_siblings_not_ids() {
    let mut store = memory_store();
    seed_indexed(
        &mut store,
        &[
            (10, None, 1),
            (20, None, 0),
            (11, Some(10), 2),
            (12, Some(10), 0),
            (13, Some(10), 1),
            (21, Some(20), 0),
            (22, Some(20), 0),
        ],
    );
    let tree = assert_strategies_agree(&store);
    let roots: Vec<i64> = tree.roots().iter().map(|n| n.id().0).collect();
    assert_eq!(roots, vec![20, 10]);
    assert_eq!(child_ids(&tree, 10), vec![12, 13, 11]);
    // equal positions fall back to id
    assert_eq!(child_ids(&tree, 20), vec![21, 22]);
    assert_eq!(
        ids(&tree),
        [20, 21, 22, 10, 12, 13, 11].map(NodeId).to_vec()
    );
}

#[test]
fn depths_are_relative_to_the_loaded_scope() {
    let mut store = memory_store();
    seed_indexed(
        &mut store,
        &[(1, None, 0), (2, Some(1), 0), (3, Some(2), 0), (4, Some(3), 0)],
    );
    let full = assert_strategies_agree(&store);
    let depths: Vec<u32> = full.iter().map(|n| n.depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 3]);

    let options = TreeOptions::default();
    for strategy in Strategy::ALL {
        let subtree = strategy
            .loader(&options)
            .load_subtree(&store, NodeId(3))
            .unwrap();
        let depths: Vec<(i64, u32)> = subtree.iter().map(|n| (n.id().0, n.depth)).collect();
        assert_eq!(depths, vec![(3, 0), (4, 1)], "{strategy}");
    }
}

#[test]
fn random_forests_agree() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    for round in 0..8 {
        let mut store = memory_store();
        let count = rng.gen_range(1..200i64);
        let rows: Vec<(i64, Option<i64>, i64)> = (1..=count)
            .map(|id| {
                let parent = if id == 1 || rng.gen_bool(0.1) {
                    None
                } else {
                    Some(rng.gen_range(1..id))
                };
                (id, parent, rng.gen_range(0..4))
            })
            .collect();
        seed_indexed(&mut store, &rows);
        let tree = assert_strategies_agree(&store);
        assert_eq!(tree.len(), count as usize, "round {round}");
    }
}

#[test]
fn profiled_loads_split_fetch_and_assembly() {
    let mut store = memory_store();
    seed_indexed(&mut store, &common::balanced_rows(&[3, 3]));
    let options = TreeOptions::default();
    for strategy in Strategy::ALL {
        let report = strategy.loader(&options).load_profiled(&store).unwrap();
        assert_eq!(report.strategy, strategy);
        assert_eq!(report.rows, 13);
        assert!(report.round_trips >= 1);
        assert_eq!(report.tree.len(), 13);
    }
}

#[test]
fn tree_serializes_nested_json() {
    let mut store = memory_store();
    seed_indexed(&mut store, &[(1, None, 0), (2, Some(1), 0)]);
    let tree = assert_strategies_agree(&store);
    let value: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
    let root = &value[0];
    assert_eq!(root["id"], 1);
    assert_eq!(root["depth"], 0);
    assert_eq!(root["slug"], "category-1-1");
    assert_eq!(root["children"][0]["id"], 2);
    assert_eq!(root["children"][0]["depth"], 1);
    assert!(root["created_at"].as_str().unwrap().ends_with('Z'));
}
