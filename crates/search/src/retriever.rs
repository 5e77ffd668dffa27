use crate::error::{Result, SearchError};
use docrag_vector_store::{Embedder, KnowledgeBase, SearchHit, Snapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Results returned when the caller does not ask for a count
pub const DEFAULT_TOP_K: usize = 3;

/// One ranked match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// 1-based, ascending by distance
    pub rank: usize,
    pub position: usize,
    pub text: String,
    /// Squared L2 distance between query and chunk embeddings
    pub distance: f32,
}

/// Query side of the pipeline.
///
/// Cheap to share: every call works on its own snapshot, so any number of
/// queries run concurrently with each other and with ingestion.
#[derive(Clone)]
pub struct Retriever {
    kb: Arc<KnowledgeBase>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// `embedder` must be the one the store was built with
    pub fn new(kb: Arc<KnowledgeBase>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        kb.ensure_embedder(embedder.as_ref())?;
        Ok(Self { kb, embedder })
    }

    #[must_use]
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.kb
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        if top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let query_vector = self.embedder.embed(query).await?;
        let snapshot = self.kb.snapshot();
        let hits = snapshot.search(&query_vector, top_k)?;
        log::debug!(
            "Query '{query}' matched {} of {} chunks",
            hits.len(),
            snapshot.index().len()
        );
        rank(&snapshot, hits)
    }
}

fn rank(snapshot: &Snapshot, hits: Vec<SearchHit>) -> Result<Vec<RetrievalResult>> {
    hits.into_iter()
        .enumerate()
        .map(|(i, hit)| {
            let text = snapshot.text(hit.position).map_err(|_| {
                log::error!(
                    "Index/store drift: hit at position {} but only {} chunks are stored",
                    hit.position,
                    snapshot.chunks().len()
                );
                SearchError::Consistency {
                    position: hit.position,
                    len: snapshot.chunks().len(),
                }
            })?;
            Ok(RetrievalResult {
                rank: i + 1,
                position: hit.position,
                text: text.to_string(),
                distance: hit.distance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_indexer::{IngestionPipeline, PipelineConfig};
    use docrag_vector_store::StubEmbedder;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn seeded(docs: &[&str]) -> Retriever {
        let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(64));
        let kb = Arc::new(KnowledgeBase::in_memory(embedder.as_ref()));
        let pipeline =
            IngestionPipeline::new(kb.clone(), embedder.clone(), PipelineConfig::default())
                .unwrap();
        for doc in docs {
            pipeline.ingest(doc).await.unwrap();
        }
        Retriever::new(kb, embedder).unwrap()
    }

    #[tokio::test]
    async fn closest_chunk_ranks_first() {
        let retriever = seeded(&["Alpha beta.", "Gamma delta.", "Epsilon zeta."]).await;
        let results = retriever.retrieve("alpha", DEFAULT_TOP_K).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].position, 0);
        assert_eq!(results[0].text, "Alpha beta.");
        assert!(results[0].distance < results[1].distance);
        assert_eq!(
            results.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn top_k_larger_than_store_returns_everything() {
        let retriever = seeded(&["Alpha beta.", "Gamma delta."]).await;
        let results = retriever.retrieve("gamma", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "Gamma delta.");
    }

    #[tokio::test]
    async fn empty_store_returns_no_results() {
        let retriever = seeded(&[]).await;
        assert!(retriever.retrieve("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_a_client_error() {
        let retriever = seeded(&["Alpha beta."]).await;

        let blank = retriever.retrieve("   ", 3).await.unwrap_err();
        assert!(matches!(blank, SearchError::InvalidQuery));
        assert!(blank.is_client_error());

        let zero = retriever.retrieve("alpha", 0).await.unwrap_err();
        assert!(matches!(zero, SearchError::InvalidArgument(_)));
        assert!(zero.is_client_error());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_see_whole_snapshots_while_ingesting() {
        let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(64));
        let kb = Arc::new(KnowledgeBase::in_memory(embedder.as_ref()));
        let pipeline =
            IngestionPipeline::new(kb.clone(), embedder.clone(), PipelineConfig::default())
                .unwrap();
        let retriever = Retriever::new(kb.clone(), embedder.clone()).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let retriever = retriever.clone();
                let kb = kb.clone();
                let done = done.clone();
                let query = embedder.clone();
                tokio::spawn(async move {
                    let query = query.embed("doc").await.unwrap();
                    let mut last_len = 0;
                    let mut rounds = 0usize;
                    while !done.load(Ordering::Acquire) || rounds == 0 {
                        let snapshot = kb.snapshot();
                        assert!(snapshot.is_aligned());
                        assert!(snapshot.chunks().len() >= last_len);
                        last_len = snapshot.chunks().len();
                        for hit in snapshot.search(&query, 5).unwrap() {
                            assert!(snapshot.text(hit.position).is_ok());
                        }

                        for result in retriever.retrieve("doc", 5).await.unwrap() {
                            assert_eq!(result.text, format!("doc {}", result.position));
                        }
                        rounds += 1;
                        tokio::task::yield_now().await;
                    }
                    rounds
                })
            })
            .collect();

        for n in 0..60 {
            let outcome = pipeline.ingest(&format!("doc {n}")).await.unwrap();
            assert_eq!(outcome.positions, n..n + 1);
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.await.unwrap() > 0);
        }
        let status = kb.status();
        assert_eq!(status.chunks, 60);
        assert_eq!(status.vectors, 60);
    }

    #[test]
    fn drifted_position_is_a_consistency_error() {
        let snapshot = Snapshot::default();
        let hits = vec![SearchHit {
            position: 4,
            distance: 0.5,
        }];
        let err = rank(&snapshot, hits).unwrap_err();
        assert!(matches!(err, SearchError::Consistency { position: 4, len: 0 }));
        assert!(!err.is_client_error());
    }

    #[test]
    fn retriever_rejects_foreign_embedder() {
        let kb = Arc::new(KnowledgeBase::in_memory(&StubEmbedder::new(64)));
        let result = Retriever::new(kb, Arc::new(StubEmbedder::new(128)));
        assert!(matches!(result.err(), Some(SearchError::VectorStoreError(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn ranks_are_dense_and_distances_ascend(
            docs in prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,4}", 1..8),
            query in "[a-z]{1,8}",
            top_k in 1usize..10,
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let results = runtime.block_on(async {
                let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
                seeded(&refs).await.retrieve(&query, top_k).await.unwrap()
            });
            prop_assert_eq!(results.len(), top_k.min(docs.len()));
            for (i, result) in results.iter().enumerate() {
                prop_assert_eq!(result.rank, i + 1);
            }
            for pair in results.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
                if pair[0].distance == pair[1].distance {
                    prop_assert!(pair[0].position < pair[1].position);
                }
            }
        }
    }
}
