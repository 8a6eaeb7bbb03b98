//! Journey: deleting a node clears every projection and side row

use pibrain_e2e_tests::harness::TestDb;
use pibrain_e2e_tests::mocks::fixtures::{embedding, rich_node};
use pibrain_core::NodeFilters;

#[test]
fn delete_clears_rows_indexes_and_vectors() {
    let db = TestDb::new();
    let node = rich_node("Cascade target with everything attached");
    db.store.create_node(&node, false).unwrap();
    db.store
        .store_embedding_with_vec(
            &node.id,
            &embedding(3.0),
            "test-model",
            "cascade input text",
        )
        .unwrap();

    // Everything is reachable before the delete.
    assert!(db.store.get_node(&node.id).unwrap().is_some());
    assert!(db.store.node_summary(&node.id).unwrap().is_some());
    assert!(db.store.get_node_embedding(&node.id).unwrap().is_some());
    assert!(!db
        .store
        .search_nodes("cascade", &NodeFilters::default(), 10)
        .unwrap()
        .is_empty());
    assert!(!db
        .store
        .search_by_vector(&embedding(3.0), &Default::default())
        .unwrap()
        .is_empty());

    assert!(db.store.delete_node(&node.id).unwrap());

    // And gone everywhere after.
    assert!(db.store.get_node(&node.id).unwrap().is_none());
    assert!(db.store.node_summary(&node.id).unwrap().is_none());
    assert!(db.store.get_node_embedding(&node.id).unwrap().is_none());
    assert!(db
        .store
        .search_nodes("cascade", &NodeFilters::default(), 10)
        .unwrap()
        .is_empty());
    assert!(db
        .store
        .search_by_vector(&embedding(3.0), &Default::default())
        .unwrap()
        .is_empty());

    // Lessons are gone, so their tags are too.
    let lessons = db
        .store
        .list_lessons(&Default::default(), Default::default())
        .unwrap();
    assert_eq!(lessons.total, 0);
}

#[test]
fn deleting_a_missing_node_reports_false() {
    let db = TestDb::new();
    assert!(!db.store.delete_node("feedfacedeadbeef").unwrap());
}

#[test]
fn delete_works_without_the_vector_extension() {
    let db = TestDb::without_vec();
    let node = rich_node("No-vec cascade target");
    db.store.create_node(&node, false).unwrap();

    assert!(db.store.delete_node(&node.id).unwrap());
    assert!(db.store.get_node(&node.id).unwrap().is_none());
}
