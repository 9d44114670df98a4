//! End-to-end: walk a small project, index it into an in-memory store, and
//! run a hybrid search against what landed.

use std::sync::Arc;

use codegraph_engine::embeddings::{EmbeddingConfig, EmbeddingService};
use codegraph_engine::hybrid_search::{HybridSearchService, SearchOptions};
use codegraph_engine::indexer::{Indexer, IndexerConfig};
use codegraph_engine::optimization::ledger::InMemoryLedger;
use codegraph_engine::store::{create_in_memory_store, GraphStore};

fn write_project(dir: &tempfile::TempDir) {
    std::fs::write(
        dir.path().join("widget.rs"),
        r#"
pub struct Widget {
    pub name: String,
}

impl Widget {
    pub fn render(&self) -> String {
        self.name.clone()
    }
}

pub fn build_widget(name: &str) -> Widget {
    Widget { name: name.to_string() }
}
"#,
    )
    .unwrap();

    std::fs::write(
        dir.path().join("gadget.rs"),
        r#"
pub fn build_gadget() -> String {
    "gadget".to_string()
}
"#,
    )
    .unwrap();
}

#[tokio::test]
async fn full_index_then_search_round_trips_entities() {
    let dir = tempfile::tempdir().unwrap();
    write_project(&dir);

    let store = create_in_memory_store();
    let ledger = Arc::new(InMemoryLedger::new());
    let indexer = Indexer::new(store.clone(), ledger, IndexerConfig::default());

    let result = indexer
        .index_project(dir.path(), &[], &[])
        .await
        .expect("indexing a well-formed project should not fail");

    assert_eq!(result.scanning.files, 2);
    assert_eq!(result.total_errors, 0);

    let entities = store
        .query(
            &codegraph_engine::store::QueryScript::new("entities", "SELECT * FROM entities"),
            &codegraph_engine::store::QueryParams::new(),
        )
        .await
        .unwrap();
    assert!(
        entities.rows.iter().any(|row| matches!(
            row.get("name"),
            Some(codegraph_engine::store::QueryValue::Text(n)) if n == "build_widget"
        )),
        "expected the build_widget function to have been extracted"
    );

    let embeddings = Arc::new(
        EmbeddingService::new(EmbeddingConfig::default())
            .await
            .expect("local embedding provider is always constructible"),
    );
    let search = HybridSearchService::new(store.clone(), embeddings);

    let response = search
        .search("widget", SearchOptions::new())
        .await
        .expect("search against a populated store should not fail");

    assert!(response.meta.processing_time_ms < 60_000);
}

#[tokio::test]
async fn incremental_reindex_removes_deleted_files() {
    let dir = tempfile::tempdir().unwrap();
    write_project(&dir);

    let store = create_in_memory_store();
    let ledger = Arc::new(InMemoryLedger::new());
    let indexer = Indexer::new(store.clone(), ledger, IndexerConfig::default());

    indexer.index_project(dir.path(), &[], &[]).await.unwrap();

    std::fs::remove_file(dir.path().join("gadget.rs")).unwrap();

    let result = indexer
        .index_project_incremental(dir.path(), &[], &[])
        .await
        .unwrap();

    // Nothing left to add or modify once gadget.rs is gone and widget.rs is
    // unchanged, so the incremental pass should touch zero files.
    assert_eq!(result.scanning.files, 0);
}
