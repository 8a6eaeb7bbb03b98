//! Journey: reanalysis versioning, embedding round-trips, and
//! capability-gated migrations

use pibrain_core::{
    build_embedding_text, deserialize_embedding, is_rich_embedding_format, next_node_version,
    serialize_embedding, VecMode,
};
use pibrain_e2e_tests::harness::TestDb;
use pibrain_e2e_tests::mocks::fixtures::{embedding, rich_node, session_node};

#[test]
fn reanalysis_chains_previous_versions() {
    let db = TestDb::new();
    let node = session_node("First analysis of the segment");
    db.store.create_node(&node, false).unwrap();

    // v1 -> v2
    let v1 = db.store.get_node(&node.id).unwrap().unwrap();
    let v2 = next_node_version(&v1, session_node("Second analysis of the segment"));
    assert_eq!(v2.version, 2);
    assert_eq!(v2.previous_versions, vec![format!("{}-v1", node.id)]);
    db.store.update_node(&v2).unwrap();

    // v2 -> v3: the chain extends by exactly one reference.
    let stored_v2 = db.store.get_node(&node.id).unwrap().unwrap();
    let v3 = next_node_version(&stored_v2, session_node("Third analysis of the segment"));
    assert_eq!(
        v3.previous_versions,
        vec![format!("{}-v1", node.id), format!("{}-v2", node.id)]
    );
    assert!(v3.analyzed_at >= stored_v2.analyzed_at);

    db.store.update_node(&v3).unwrap();
    let current = db.store.get_node(&node.id).unwrap().unwrap();
    assert_eq!(current.version, 3);
    assert_eq!(current.previous_versions.len(), 2);

    // Only the current version answers from the database.
    assert!(db.store.get_node_version(&node.id, 3).unwrap().is_some());
    assert!(db.store.get_node_version(&node.id, 1).unwrap().is_none());
}

#[test]
fn embedding_codec_roundtrips_bit_for_bit() {
    let vector = embedding(11.0);
    let bytes = serialize_embedding(&vector);
    assert_eq!(bytes.len(), vector.len() * 4);

    let back = deserialize_embedding(&bytes).unwrap();
    for (a, b) in vector.iter().zip(back.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn rich_embedding_text_is_always_recognized() {
    for node in [
        session_node("bare summary node"),
        rich_node("node with decisions and lessons"),
    ] {
        let text = build_embedding_text(&node);
        assert!(is_rich_embedding_format(&text), "unrecognized: {text:?}");
    }
}

#[test]
fn reindexing_twice_is_idempotent() {
    let db = TestDb::new();
    let node = rich_node("Idempotent reindex target");
    db.store.create_node(&node, false).unwrap();

    let first = db.store.update_node(&node).unwrap();
    let after_first = db.store.node_summary(&node.id).unwrap();
    let second = db.store.update_node(&first).unwrap();
    let after_second = db.store.node_summary(&node.id).unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(first.version, second.version);

    // Exactly one FTS row regardless of how often the node is indexed.
    let stats = db.store.stats().unwrap();
    assert_eq!(stats.nodes, 1);
}

#[test]
fn vec_migration_heals_when_capability_appears() {
    // Open without the extension: the vec migration records a skip.
    let db = TestDb::without_vec();
    let node = session_node("node created before vectors existed");
    db.store.create_node(&node, false).unwrap();
    assert!(!db.store.is_vec_loaded());

    // Reopen with it: the skipped migration re-applies and vector
    // writes start working.
    let db = db.reopen(VecMode::Required);
    assert!(db.store.is_vec_loaded());
    db.store
        .store_embedding_with_vec(&node.id, &embedding(2.0), "m", "text")
        .unwrap();
    let hits = db
        .store
        .search_by_vector(&embedding(2.0), &Default::default())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.id, node.id);
}

#[test]
fn schema_version_is_stable_across_reopens() {
    let db = TestDb::new();
    let version = db.store.stats().unwrap().schema_version;
    let db = db.reopen(VecMode::Required);
    assert_eq!(db.store.stats().unwrap().schema_version, version);
}
