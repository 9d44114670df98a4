//! Cross-module checks for the optimization façade: the batch writer
//! actually lands rows in the store, and the entity bloom filter/heat
//! tracker agree on what the indexer has touched.

use std::sync::Arc;

use codegraph_engine::model::EntityKind;
use codegraph_engine::optimization::batch_writer::{BatchWriter, BatchWriterConfig};
use codegraph_engine::optimization::bloom::{BloomConfig, EntityFilter};
use codegraph_engine::optimization::heat::{HeatConfig, HeatTracker};
use codegraph_engine::store::{create_in_memory_store, GraphStore, QueryParams, QueryScript, QueryValue};
use codegraph_engine::types::ValidatedDocumentId;

#[tokio::test]
async fn batch_writer_flushes_on_shutdown() {
    let store = create_in_memory_store();
    let writer = BatchWriter::new(store.clone(), BatchWriterConfig::default());

    let id = ValidatedDocumentId::new();
    let mut row = std::collections::HashMap::new();
    row.insert("id".to_string(), QueryValue::Id(id));
    writer.enqueue("entities".to_string(), row, 0).await.unwrap();

    assert_eq!(writer.pending_len().await, 1);
    writer.shutdown().await.unwrap();
    assert_eq!(writer.pending_len().await, 0);

    let result = store
        .query(&QueryScript::new("entities", "SELECT * FROM entities"), &QueryParams::new())
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 1);
}

#[tokio::test]
async fn batch_writer_flushes_automatically_at_capacity() {
    let store = create_in_memory_store();
    let config = BatchWriterConfig {
        max_batch_size: 2,
        ..BatchWriterConfig::default()
    };
    let writer = BatchWriter::new(store.clone(), config);

    for _ in 0..2 {
        let mut row = std::collections::HashMap::new();
        row.insert("id".to_string(), QueryValue::Id(ValidatedDocumentId::new()));
        writer.enqueue("entities".to_string(), row, 0).await.unwrap();
    }

    assert_eq!(writer.pending_len().await, 0, "queue should auto-flush once full");
    let result = store
        .query(&QueryScript::new("entities", "SELECT * FROM entities"), &QueryParams::new())
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[test]
fn bloom_filter_and_heat_tracker_agree_on_known_entities() {
    let mut filter = EntityFilter::new(BloomConfig::default());
    let mut heat = HeatTracker::new(HeatConfig::default());

    let known = ValidatedDocumentId::new();
    let unknown = ValidatedDocumentId::new();

    filter.add(known, EntityKind::Function);
    heat.record_access(known, EntityKind::Function);

    assert!(filter.might_exist(known, EntityKind::Function));
    assert!(!filter.might_exist(unknown, EntityKind::Function));
    assert!(heat.temperature(known).is_some());
    assert!(heat.temperature(unknown).is_none());
}
