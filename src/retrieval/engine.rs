//! 하이브리드 질의 엔진
//!
//! 에이전트/CLI가 호출하는 단일 진입점입니다.
//! 검색 → 리랭크 → 합성은 순서대로 실행되며 어느 단계든 실패하면 질의가 실패합니다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::hybrid::HybridRetriever;
use super::keyword::KeywordRetriever;
use super::rerank::RankGptReranker;
use super::synthesize::ResponseSynthesizer;
use super::vector::VectorRetriever;
use super::Retriever;
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::knowledge::{CollectionHandle, CollectionRecord, CollectionStore, ScoredPassage};
use crate::models::UserModels;

/// 답변 출처
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    pub name: String,
    pub link: String,
    pub text: String,
    pub score: Option<f32>,
}

impl From<ScoredPassage> for SourceNode {
    fn from(scored: ScoredPassage) -> Self {
        Self {
            name: scored.passage.metadata.name,
            link: scored.passage.metadata.link,
            text: scored.passage.text,
            score: scored.score,
        }
    }
}

/// 질의 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub source_nodes: Vec<SourceNode>,
}

/// 컬렉션 하나에 대한 질의 엔진
pub struct HybridQueryEngine {
    record: CollectionRecord,
    retriever: Arc<dyn Retriever>,
    reranker: RankGptReranker,
    synthesizer: ResponseSynthesizer,
}

impl HybridQueryEngine {
    /// 구성 요소로 직접 생성
    pub fn new(
        record: CollectionRecord,
        retriever: Arc<dyn Retriever>,
        reranker: RankGptReranker,
        synthesizer: ResponseSynthesizer,
    ) -> Self {
        Self {
            record,
            retriever,
            reranker,
            synthesizer,
        }
    }

    /// 로드된 컬렉션으로 생성
    ///
    /// 임베딩 모델이 컬렉션과 다르면 `RagError::EmbeddingMismatch`입니다.
    pub fn from_handle(
        handle: CollectionHandle,
        models: &UserModels,
        config: &RetrievalConfig,
    ) -> Result<Self> {
        let vector = VectorRetriever::new(&handle, models.embedding.clone(), config.k_semantic)?;
        let keyword =
            KeywordRetriever::new(&handle, config.k_keyword, config.max_keywords_per_query);
        let retriever = HybridRetriever::new(Arc::new(vector), Arc::new(keyword));

        Ok(Self::new(
            handle.record,
            Arc::new(retriever),
            RankGptReranker::new(models.llm.clone(), config.top_n()),
            ResponseSynthesizer::new(models.llm.clone(), config.context_window_tokens),
        ))
    }

    /// 저장소에서 컬렉션을 로드해서 생성 (없으면 `None`)
    pub async fn open(
        store: &CollectionStore,
        name: &str,
        models: &UserModels,
    ) -> Result<Option<Self>> {
        match store.load(name).await? {
            Some(handle) => Ok(Some(Self::from_handle(
                handle,
                models,
                store.retrieval_config(),
            )?)),
            None => Ok(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn description(&self) -> &str {
        &self.record.description
    }

    /// 병합된 후보 (리랭크 전)
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>> {
        self.retriever.retrieve(query).await
    }

    /// 질의 실행
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        tracing::info!("Query on '{}': {}", self.record.name, query);

        let candidates = self.retriever.retrieve(query).await?;
        let ranked = self.reranker.rerank(query, candidates).await?;
        let response = self.synthesizer.synthesize(query, &ranked).await?;

        Ok(QueryResponse {
            response,
            source_nodes: ranked.into_iter().map(SourceNode::from).collect(),
        })
    }
}
