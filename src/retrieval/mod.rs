//! Retrieval 모듈 - 하이브리드 질의 파이프라인
//!
//! 질의 → (벡터 검색 ∥ 키워드 검색) → 병합 → 리랭크 → 응답 합성
//!
//! - Vector: 컬렉션 임베딩 모델과 같은 모델로 질의를 임베딩
//! - Keyword: 질의에서 빈도 기반 키워드를 뽑아 키워드 테이블 매칭
//! - Hybrid: 벡터 결과 먼저, 그 다음 새로 나온 키워드 결과 (ID 기준 중복 제거)
//! - Rerank: 언어 모델이 후보 순서를 다시 매기고 top_n만 남김
//! - Synthesize: 남은 Passage로 답변 생성

use async_trait::async_trait;

use crate::error::Result;
use crate::knowledge::ScoredPassage;

mod engine;
mod hybrid;
mod keyword;
mod rerank;
mod synthesize;
mod vector;

// Re-exports
pub use engine::{HybridQueryEngine, QueryResponse, SourceNode};
pub use hybrid::{fuse, FusionStats, HybridRetriever};
pub use keyword::KeywordRetriever;
pub use rerank::{parse_permutation, RankGptReranker, MAX_PASSAGE_WORDS};
pub use synthesize::{ResponseSynthesizer, EMPTY_RESPONSE, REFINE_TEMPLATE, TEXT_QA_TEMPLATE};
pub use vector::VectorRetriever;

/// 검색기 트레이트
///
/// 결과 개수는 각 검색기가 생성될 때 정해집니다.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>>;

    /// 로그용 이름
    fn name(&self) -> &'static str;
}
