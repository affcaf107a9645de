//! 벡터 검색기

use std::sync::Arc;

use async_trait::async_trait;

use super::Retriever;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::knowledge::{CollectionHandle, LanceVectorIndex, ScoredPassage};

/// 컬렉션 벡터 인덱스 검색기
pub struct VectorRetriever {
    index: Arc<LanceVectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    similarity_top_k: usize,
}

impl VectorRetriever {
    /// 검색기 생성
    ///
    /// 컬렉션을 만든 임베딩 모델과 현재 임베딩 모델이 다르면
    /// `RagError::EmbeddingMismatch`를 반환합니다.
    pub fn new(
        handle: &CollectionHandle,
        embedder: Arc<dyn EmbeddingProvider>,
        similarity_top_k: usize,
    ) -> Result<Self> {
        if handle.record.embedding_name != embedder.name() {
            return Err(RagError::EmbeddingMismatch {
                collection: handle.record.name.clone(),
                stored: handle.record.embedding_name.clone(),
                active: embedder.name().to_string(),
            });
        }

        Ok(Self {
            index: handle.vector.clone(),
            embedder,
            similarity_top_k,
        })
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>> {
        let query_embedding = self.embedder.embed(query).await?;
        let results = self
            .index
            .search(&query_embedding, self.similarity_top_k)
            .await?;

        tracing::debug!("Vector retrieval: {} hit(s)", results.len());
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}
