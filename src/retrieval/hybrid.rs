//! 하이브리드 검색 - 벡터 + 키워드 결과 병합
//!
//! 병합 규칙:
//! 1. 벡터 결과를 받은 순서대로 모두 추가
//! 2. 키워드 결과를 받은 순서대로 추가하되, 이미 추가된 Passage ID는 건너뜀
//!
//! 스코어는 건드리지 않습니다. 벡터 결과의 유사도는 그대로, 키워드 결과의
//! 없는 스코어는 없는 그대로 리랭커에 넘어갑니다.
//! 중복 판단은 텍스트가 아니라 Passage ID 기준입니다.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::Retriever;
use crate::error::Result;
use crate::knowledge::ScoredPassage;

// ============================================================================
// Fusion
// ============================================================================

/// 병합 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionStats {
    pub vector_hits: usize,
    pub keyword_hits: usize,
    /// 키워드 결과 중 이미 있던 ID 수
    pub overlaps: usize,
    pub fused: usize,
}

/// 두 결과 목록 병합
pub fn fuse(
    vector: Vec<ScoredPassage>,
    keyword: Vec<ScoredPassage>,
) -> (Vec<ScoredPassage>, FusionStats) {
    let mut stats = FusionStats {
        vector_hits: vector.len(),
        keyword_hits: keyword.len(),
        ..FusionStats::default()
    };

    let mut seen: HashSet<String> = HashSet::with_capacity(vector.len() + keyword.len());
    let mut fused = Vec::with_capacity(vector.len() + keyword.len());

    for candidate in vector {
        if seen.insert(candidate.passage.id.clone()) {
            fused.push(candidate);
        }
    }

    for candidate in keyword {
        if seen.insert(candidate.passage.id.clone()) {
            fused.push(candidate);
        } else {
            stats.overlaps += 1;
        }
    }

    stats.fused = fused.len();
    (fused, stats)
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// 하이브리드 검색기
///
/// 두 검색을 동시에 실행하고, 어느 한쪽이라도 실패하면 질의 전체가 실패합니다.
pub struct HybridRetriever {
    vector: Arc<dyn Retriever>,
    keyword: Arc<dyn Retriever>,
}

impl HybridRetriever {
    pub fn new(vector: Arc<dyn Retriever>, keyword: Arc<dyn Retriever>) -> Self {
        Self { vector, keyword }
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>> {
        let (vector_results, keyword_results) = tokio::try_join!(
            self.vector.retrieve(query),
            self.keyword.retrieve(query),
        )?;

        let (fused, stats) = fuse(vector_results, keyword_results);

        tracing::info!(
            "Hybrid retrieval: {} vector + {} keyword ({} overlap) -> {} candidates",
            stats.vector_hits,
            stats.keyword_hits,
            stats.overlaps,
            stats.fused
        );

        Ok(fused)
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}

// ============================================================================
// Tests
// ============================================================================
