//! Journey: unresolved relationship stored, found, and resolved

use pibrain_core::{RelationshipInput, StoreError};
use pibrain_e2e_tests::harness::TestDb;
use pibrain_e2e_tests::mocks::fixtures::session_node;

fn derived_from(source: &str) -> RelationshipInput {
    RelationshipInput {
        source_node_id: source.to_string(),
        relationship_type: "DERIVED_FROM".to_string(),
        target_node_id: None,
        target_description: Some("Earlier auth work".to_string()),
        confidence: 0.7,
        reason: "continues the session-token refactor".to_string(),
    }
}

#[test]
fn unresolved_to_resolved_roundtrip() {
    let db = TestDb::new();
    let src = session_node("Refactored token issuing");
    let dst = session_node("Original auth implementation");
    db.store.create_node(&src, false).unwrap();
    db.store.create_node(&dst, false).unwrap();

    let edge = db.store.store_relationship(&derived_from(&src.id)).unwrap();

    // Stored as a pending self-loop.
    assert_eq!(edge.source_node_id, edge.target_node_id);
    assert!(edge.is_pending());

    let pending = db
        .store
        .find_unresolved_relationships(Some(&src.id))
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, edge.id);

    assert!(db.store.resolve_relationship(&edge.id, &dst.id).unwrap());

    let from_src = db.store.get_edges_from(&src.id).unwrap();
    assert_eq!(from_src.len(), 1);
    let resolved = &from_src[0];
    assert_eq!(resolved.target_node_id, dst.id);
    assert_eq!(
        resolved.metadata.resolved_from.as_deref(),
        Some("Earlier auth work")
    );
    assert!(resolved.metadata.resolved_at.is_some());
    assert!(resolved.metadata.unresolved_target.is_none());

    assert!(db
        .store
        .find_unresolved_relationships(Some(&src.id))
        .unwrap()
        .is_empty());
}

#[test]
fn resolving_an_unknown_edge_returns_false() {
    let db = TestDb::new();
    let dst = session_node("any target");
    db.store.create_node(&dst, false).unwrap();
    assert!(!db
        .store
        .resolve_relationship("edg_000000000000", &dst.id)
        .unwrap());
}

#[test]
fn validation_reports_per_item_and_batch_continues() {
    let db = TestDb::new();
    let src = session_node("batch source");
    db.store.create_node(&src, false).unwrap();

    let mut no_reason = derived_from(&src.id);
    no_reason.reason = String::new();
    let mut bad_type = derived_from(&src.id);
    bad_type.relationship_type = "semantic".to_string();

    let results = db
        .store
        .store_relationships(&[derived_from(&src.id), no_reason, bad_type]);
    assert!(results[0].is_ok());
    assert!(matches!(&results[1], Err(StoreError::InvalidRelationship(m)) if m.contains("reason")));
    assert!(matches!(&results[2], Err(StoreError::InvalidRelationship(m)) if m.contains("semantic")));

    // The valid one landed.
    assert_eq!(
        db.store
            .find_unresolved_relationships(Some(&src.id))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn pending_edges_do_not_pollute_unfiltered_queries() {
    let db = TestDb::new();
    let a = session_node("first source");
    let b = session_node("second source");
    db.store.create_node(&a, false).unwrap();
    db.store.create_node(&b, false).unwrap();

    db.store.store_relationship(&derived_from(&a.id)).unwrap();
    db.store.store_relationship(&derived_from(&b.id)).unwrap();

    let all = db.store.find_unresolved_relationships(None).unwrap();
    assert_eq!(all.len(), 2);

    let only_a = db.store.find_unresolved_relationships(Some(&a.id)).unwrap();
    assert_eq!(only_a.len(), 1);
    assert_eq!(only_a[0].source_node_id, a.id);
}
