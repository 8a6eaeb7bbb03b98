//! Journey: bridge discovery over a cyclic graph

use pibrain_core::{BridgeOptions, EdgeType};
use pibrain_e2e_tests::harness::TestDb;
use pibrain_e2e_tests::mocks::fixtures::{confident_edge, session_node};

/// a -> b (0.8), b -> c (0.9), c -> a (0.5)
fn triangle(db: &TestDb) -> Vec<String> {
    let mut ids = Vec::new();
    for name in ["alpha work", "beta work", "gamma work"] {
        let node = session_node(name);
        db.store.create_node(&node, false).unwrap();
        ids.push(node.id);
    }
    db.store
        .create_edge(&confident_edge(&ids[0], &ids[1], EdgeType::RelatesTo, 0.8))
        .unwrap();
    db.store
        .create_edge(&confident_edge(&ids[1], &ids[2], EdgeType::LeadsTo, 0.9))
        .unwrap();
    db.store
        .create_edge(&confident_edge(&ids[2], &ids[0], EdgeType::RelatesTo, 0.5))
        .unwrap();
    ids
}

#[test]
fn cyclic_graph_terminates_with_expected_score() {
    let db = TestDb::new();
    let ids = triangle(&db);

    let bridges = db
        .store
        .discover_bridges(
            &[ids[0].clone()],
            &BridgeOptions {
                limit: 5,
                max_depth: 3,
                min_score: 0.1,
            },
        )
        .unwrap();
    assert!(!bridges.is_empty());

    // a -> b -> c: 1 x (0.8 x 0.9) x (0.9 x 0.9) = 0.5832
    let two_hop = bridges
        .iter()
        .find(|b| b.node_ids == vec![ids[0].clone(), ids[1].clone(), ids[2].clone()])
        .expect("two-hop path discovered");
    assert!(
        (two_hop.score - 0.5832).abs() < 1e-9,
        "score was {}",
        two_hop.score
    );
    assert_eq!(two_hop.edges.len(), 2);
    assert_eq!(two_hop.edges[0].edge_type, EdgeType::RelatesTo);
    assert_eq!(two_hop.edges[1].edge_type, EdgeType::LeadsTo);
}

#[test]
fn descriptions_chain_labels_with_edge_types() {
    let db = TestDb::new();
    let ids = triangle(&db);

    let bridges = db
        .store
        .discover_bridges(
            &[ids[0].clone()],
            &BridgeOptions {
                limit: 5,
                max_depth: 3,
                min_score: 0.1,
            },
        )
        .unwrap();
    let two_hop = bridges
        .iter()
        .find(|b| b.node_ids.len() == 3)
        .expect("two-hop path");
    assert!(two_hop.description.contains("alpha work"));
    assert!(two_hop.description.contains("-[relates to]->"));
    assert!(two_hop.description.contains("-[leads to]->"));
}

#[test]
fn results_are_sorted_and_limited() {
    let db = TestDb::new();
    let ids = triangle(&db);

    let bridges = db
        .store
        .discover_bridges(
            &ids.to_vec(),
            &BridgeOptions {
                limit: 2,
                max_depth: 3,
                min_score: 0.05,
            },
        )
        .unwrap();
    assert!(bridges.len() <= 2);
    for pair in bridges.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn default_depth_keeps_paths_short() {
    let db = TestDb::new();
    let ids = triangle(&db);

    let bridges = db
        .store
        .discover_bridges(&[ids[0].clone()], &BridgeOptions::default())
        .unwrap();
    // max_depth 2 means at most two nodes of path prefix get expanded.
    for bridge in &bridges {
        assert!(bridge.node_ids.len() <= 3);
    }
}

#[test]
fn dense_graph_respects_the_iteration_cap() {
    let db = TestDb::new();

    // A fully-connected clique of 8 high-confidence nodes explodes the
    // path space; discovery must still terminate promptly.
    let mut ids = Vec::new();
    for i in 0..8 {
        let node = session_node(&format!("clique member {i}"));
        db.store.create_node(&node, false).unwrap();
        ids.push(node.id);
    }
    for from in &ids {
        for to in &ids {
            if from != to {
                db.store
                    .create_edge(&confident_edge(from, to, EdgeType::RelatesTo, 0.95))
                    .unwrap();
            }
        }
    }

    let bridges = db
        .store
        .discover_bridges(
            &ids.to_vec(),
            &BridgeOptions {
                limit: 500,
                max_depth: 8,
                min_score: 0.0001,
            },
        )
        .unwrap();
    // Bounded output despite the enormous path space.
    assert!(bridges.len() <= 500);
}
