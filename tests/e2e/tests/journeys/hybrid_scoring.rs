//! Journey: hybrid search scoring and weight normalization

use pibrain_core::{EdgeType, HybridQuery, HybridWeights};
use pibrain_e2e_tests::harness::TestDb;
use pibrain_e2e_tests::mocks::fixtures::{
    aged_node, confident_edge, embedding, ingest_with_embedding, session_node,
};

#[test]
fn default_weights_sum_to_one_point_three() {
    let w = HybridWeights::default();
    let sum = w.vector + w.keyword + w.relation + w.content + w.temporal + w.tag
        + w.importance
        + w.recency;
    assert!((sum - 1.30).abs() < 0.05, "weight sum was {sum}");
}

#[test]
fn recency_importance_and_relation_differentiate_nodes() {
    let db = TestDb::new();

    let mut recent = aged_node("test fixture recent work", 2);
    recent.importance = Some(0.7);
    let mut stale = aged_node("test fixture stale work", 30);
    stale.importance = Some(0.5);
    db.store.create_node(&recent, false).unwrap();
    db.store.create_node(&stale, false).unwrap();

    // Three edges for the recent node, one for the stale one.
    let mut neighbors = Vec::new();
    for i in 0..3 {
        let neighbor = session_node(&format!("neighbor {i}"));
        db.store.create_node(&neighbor, false).unwrap();
        db.store
            .create_edge(&confident_edge(
                &recent.id,
                &neighbor.id,
                EdgeType::Semantic,
                0.8,
            ))
            .unwrap();
        neighbors.push(neighbor.id);
    }
    db.store
        .create_edge(&confident_edge(
            &stale.id,
            &neighbors[0],
            EdgeType::Semantic,
            0.8,
        ))
        .unwrap();

    let response = db
        .store
        .hybrid_search(&HybridQuery {
            query: "test".to_string(),
            ..Default::default()
        })
        .unwrap();

    let get = |id: &str| {
        response
            .results
            .iter()
            .find(|h| h.node.id == id)
            .unwrap_or_else(|| panic!("node {id} missing"))
    };
    let (a, b) = (get(&recent.id), get(&stale.id));

    assert!(a.breakdown.recency > b.breakdown.recency);
    assert!(a.breakdown.importance > b.breakdown.importance);
    assert!(a.breakdown.relation > b.breakdown.relation);
    assert!(a.score > b.score);
}

#[test]
fn scores_stay_in_unit_interval() {
    let db = TestDb::new();
    let mut node = aged_node("unit interval probe", 0);
    node.importance = Some(1.0);
    ingest_with_embedding(&db.store, &node, 7.0);

    let response = db
        .store
        .hybrid_search(&HybridQuery {
            query: "unit interval probe".to_string(),
            query_vector: Some(embedding(7.0)),
            boost_tags: vec!["fixture".to_string()],
            reference_time: Some(node.timestamp),
            ..Default::default()
        })
        .unwrap();
    assert!(response.vector_search_used);
    let hit = &response.results[0];
    assert!(hit.score > 0.0 && hit.score <= 1.0, "score {}", hit.score);
    for component in [
        hit.breakdown.vector.unwrap(),
        hit.breakdown.keyword.unwrap(),
        hit.breakdown.relation,
        hit.breakdown.content,
        hit.breakdown.temporal,
        hit.breakdown.tag,
        hit.breakdown.importance,
        hit.breakdown.recency,
    ] {
        assert!((0.0..=1.0).contains(&component), "component {component}");
    }
}

#[test]
fn empty_inputs_yield_empty_response() {
    let db = TestDb::new();
    db.store
        .create_node(&session_node("present but unsearched"), false)
        .unwrap();

    let response = db.store.hybrid_search(&HybridQuery::default()).unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.total_candidates, 0);
    assert!(!response.vector_search_used);
}

#[test]
fn vector_absence_degrades_to_keyword_only() {
    let db = TestDb::without_vec();
    let node = session_node("degraded search fixture");
    db.store.create_node(&node, false).unwrap();

    let response = db
        .store
        .hybrid_search(&HybridQuery {
            query: "degraded search".to_string(),
            query_vector: Some(embedding(1.0)),
            ..Default::default()
        })
        .unwrap();
    assert!(!response.vector_search_used);
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].breakdown.vector.is_none());
}

#[test]
fn weight_overrides_change_the_mix() {
    let db = TestDb::new();
    let now_node = aged_node("override probe fresh", 0);
    let old_node = aged_node("override probe ancient", 300);
    db.store.create_node(&now_node, false).unwrap();
    db.store.create_node(&old_node, false).unwrap();

    // All weight on recency: fresh node must win decisively.
    let recency_only = HybridWeights {
        vector: 0.0,
        keyword: 0.0,
        relation: 0.0,
        content: 0.0,
        temporal: 0.0,
        tag: 0.0,
        importance: 0.0,
        recency: 1.0,
    };
    let response = db
        .store
        .hybrid_search(&HybridQuery {
            query: "override probe".to_string(),
            weights: Some(recency_only),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(response.results[0].node.id, now_node.id);
    assert!(response.results[0].score > 0.9);
    assert!(response.results[1].score < 0.01);
}
