//! Query builder assembly against a real `GraphStore` backend: building a
//! script never leaks a raw value into the text, and round-tripping field
//! casing survives a write/read cycle.

use codegraph_engine::query_builder::{to_caller_case, Op, QueryBuilder};
use codegraph_engine::store::{create_in_memory_store, GraphStore, QueryValue, Row, WriteOptions};
use codegraph_engine::types::ValidatedDocumentId;

#[tokio::test]
async fn written_rows_round_trip_through_a_built_query() {
    let store = create_in_memory_store();

    let id = ValidatedDocumentId::new();
    let mut row: Row = std::collections::HashMap::new();
    row.insert("id".to_string(), QueryValue::Id(id));
    row.insert("file_path".to_string(), QueryValue::Text("src/lib.rs".to_string()));
    store
        .write_batch("entities", vec![row], WriteOptions { upsert: true })
        .await
        .unwrap();

    let (script, params) = QueryBuilder::new("entities")
        .select(&["filePath"])
        .filter("kind", Op::Eq, Some(QueryValue::from("function")))
        .build();

    assert!(!script.text.contains("function"), "filter value must travel in params, not text");
    assert_eq!(params.len(), 1);

    let result = store.query(&script, &params).await.unwrap();
    assert_eq!(result.rows.len(), 1);

    let result = QueryBuilder::round_trip(result);
    let row = &result.rows[0];
    assert!(row.contains_key(&to_caller_case("file_path")));
}

#[tokio::test]
async fn embeddings_written_through_upsert_are_nearest_neighbour_searchable() {
    let store = create_in_memory_store();

    let close = ValidatedDocumentId::new();
    let far = ValidatedDocumentId::new();
    store.upsert_embedding(close, vec![1.0, 0.0, 0.0]).await.unwrap();
    store.upsert_embedding(far, vec![0.0, 1.0, 0.0]).await.unwrap();

    let hits = store.vector_search(&[1.0, 0.0, 0.0], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, close);
}
