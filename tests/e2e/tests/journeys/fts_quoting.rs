//! Journey: lexical search quoting and field behavior

use pibrain_e2e_tests::harness::TestDb;
use pibrain_e2e_tests::mocks::fixtures::session_node;
use pibrain_core::{FtsField, NodeFilters, SearchRequest};

#[test]
fn quoted_terms_match_the_right_node() {
    let db = TestDb::new();
    let auth = session_node("Implemented authentication with JWT tokens");
    let pool = session_node("Fixed database connection pooling");
    db.store.create_node(&auth, false).unwrap();
    db.store.create_node(&pool, false).unwrap();

    let hits = db
        .store
        .search_nodes("authentication JWT", &NodeFilters::default(), 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, auth.id);
}

#[test]
fn fts_syntax_in_queries_is_inert() {
    let db = TestDb::new();
    let node = session_node("Plain summary about quoting");
    db.store.create_node(&node, false).unwrap();

    // Operators and parens must be treated as literal tokens, not syntax.
    for hostile in ["NOT quoting", "\"quoting", "(quoting OR", "summary:*"] {
        let result = db
            .store
            .search_nodes(hostile, &NodeFilters::default(), 10);
        assert!(result.is_ok(), "query {hostile:?} errored");
    }
}

#[test]
fn empty_query_is_an_empty_page() {
    let db = TestDb::new();
    db.store
        .create_node(&session_node("Anything at all"), false)
        .unwrap();

    let response = db
        .store
        .search_nodes_advanced(&SearchRequest {
            query: "   ".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(response.total, 0);
    assert!(response.results.is_empty());
}

#[test]
fn highlights_mark_matched_words() {
    let db = TestDb::new();
    let node = session_node("Migrated the authentication service to rotating JWT tokens");
    db.store.create_node(&node, false).unwrap();

    let response = db
        .store
        .search_nodes_advanced(&SearchRequest {
            query: "JWT".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(response.total, 1);
    let highlight = response.results[0]
        .highlights
        .iter()
        .find(|h| h.field == FtsField::Summary)
        .expect("summary highlight");
    assert!(highlight.snippet.contains("<mark>JWT</mark>"));
}

#[test]
fn rank_orders_better_matches_first() {
    let db = TestDb::new();
    let mut strong = session_node("token refresh token rotation token cache");
    strong.topics = vec!["token".to_string()];
    let weak = session_node("one mention of token here");
    db.store.create_node(&strong, false).unwrap();
    db.store.create_node(&weak, false).unwrap();

    let response = db
        .store
        .search_nodes_advanced(&SearchRequest {
            query: "token".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].node.id, strong.id);
    assert!(response.results[0].rank <= response.results[1].rank);
}
