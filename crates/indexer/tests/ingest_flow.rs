use docrag_indexer::{IndexerError, IngestionPipeline, PipelineConfig, RebuildPolicy};
use docrag_text_chunker::SplitterConfig;
use docrag_vector_store::{
    ChunkStore, Embedder, KnowledgeBase, StoreLayout, StubEmbedder, VectorIndex,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn small_chunks() -> PipelineConfig {
    PipelineConfig {
        splitter: SplitterConfig::new(10, 2),
        rebuild_policy: RebuildPolicy::Incremental,
    }
}

async fn open_pipeline(layout: &StoreLayout) -> IngestionPipeline {
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(32));
    let kb = KnowledgeBase::open(layout.clone(), embedder.as_ref())
        .await
        .expect("open store");
    IngestionPipeline::new(Arc::new(kb), embedder, small_chunks()).expect("pipeline")
}

#[tokio::test]
async fn files_are_ingested_and_persisted_in_order() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::new(temp.path().join("embeddings"));
    let first = temp.path().join("first.txt");
    let second = temp.path().join("second.md");
    let empty = temp.path().join("empty.txt");
    tokio::fs::write(&first, "Alpha beta. Gamma delta. Epsilon zeta.")
        .await
        .expect("write first");
    tokio::fs::write(&second, "Eta theta.").await.expect("write second");
    tokio::fs::write(&empty, "   \n").await.expect("write empty");

    let pipeline = open_pipeline(&layout).await;
    let stats = pipeline.ingest_files(&[&first, &empty, &second]).await;
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.chunks, 7);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("empty.txt"));

    let chunks = ChunkStore::load(layout.chunks_path()).await.expect("chunks");
    let index = VectorIndex::load(layout.index_path()).await.expect("index");
    assert_eq!(chunks.len(), 7);
    assert_eq!(index.len(), 7);
    assert_eq!(chunks.get(0).expect("first chunk"), "Alpha");
    assert_eq!(chunks.get(6).expect("last chunk"), "Eta theta.");
}

#[tokio::test]
async fn legacy_chunk_file_is_reconciled() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::new(temp.path());

    // A store written before vectors were persisted alongside chunks
    let legacy: ChunkStore = ["old one", "old two"]
        .into_iter()
        .map(ToString::to_string)
        .collect();
    legacy.save(layout.chunks_path()).await.expect("save legacy");

    let pipeline = open_pipeline(&layout).await;
    assert_eq!(pipeline.knowledge_base().status().pending, 2);
    assert_eq!(pipeline.reconcile().await.expect("reconcile"), 2);
    assert_eq!(pipeline.knowledge_base().status().pending, 0);

    drop(pipeline);
    let reopened = open_pipeline(&layout).await;
    let status = reopened.knowledge_base().status();
    assert_eq!(status.chunks, 2);
    assert_eq!(status.vectors, 2);
}

#[tokio::test]
async fn failed_ingest_keeps_previous_commit_on_disk() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::new(temp.path());
    let pipeline = open_pipeline(&layout).await;
    pipeline.ingest("Alpha beta.").await.expect("first ingest");

    let err = pipeline
        .ingest_file(temp.path().join("missing.txt"))
        .await
        .expect_err("missing file");
    assert!(matches!(err, IndexerError::IoError(_)));

    drop(pipeline);
    let reopened = open_pipeline(&layout).await;
    let snapshot = reopened.knowledge_base().snapshot();
    assert_eq!(snapshot.chunks().len(), 2);
    assert!(snapshot.is_aligned());
}
