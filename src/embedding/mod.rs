//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 벡터 인덱스 구축과 쿼리 임베딩에 사용하는 프로바이더입니다.
//! 프로바이더 이름은 컬렉션 카탈로그에 `embedding_name`으로 저장되며,
//! 쿼리 시 같은 이름의 프로바이더인지 검증하는 기준이 됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::new(transport, "OpenAI text-embedding-3-small", "text-embedding-3-small", 1536);
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::provider::{OpenAiTransport, PROVIDER_NAME};

/// 한 번의 요청으로 보내는 최대 텍스트 수
const EMBED_BATCH_SIZE: usize = 64;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름 (카탈로그의 embedding_name)
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// OpenAI 임베딩 구현체
///
/// ref: https://platform.openai.com/docs/api-reference/embeddings
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    transport: OpenAiTransport,
    display_name: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedding {
    /// 새 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `transport` - 공유 HTTP 트랜스포트
    /// * `display_name` - 카탈로그에 저장할 이름
    /// * `model` - API 모델 ID
    /// * `dimension` - 임베딩 차원
    pub fn new(
        transport: OpenAiTransport,
        display_name: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            transport,
            display_name: display_name.into(),
            model: model.into(),
            dimension,
        }
    }

    /// 요청 한 번 (입력 순서대로 정렬해서 반환)
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbedResponse = self.transport.post_json("embeddings", &request).await?;
        into_ordered_vectors(response, texts.len(), self.dimension)
    }
}

/// 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// 응답을 입력 순서로 정렬하고 개수/차원을 검증
fn into_ordered_vectors(
    mut response: EmbedResponse,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(RagError::provider(
            PROVIDER_NAME,
            format!(
                "Embedding count mismatch: expected {}, got {}",
                expected,
                response.data.len()
            ),
        ));
    }

    response.data.sort_by_key(|d| d.index);

    let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(RagError::provider(
            PROVIDER_NAME,
            format!(
                "Embedding dimension mismatch: expected {}, got {}",
                dimension,
                bad.len()
            ),
        ));
    }

    Ok(vectors)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::provider(PROVIDER_NAME, "Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{}",
                i + 1,
                texts.len().div_ceil(EMBED_BATCH_SIZE)
            );
            results.extend(self.request(batch).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `OPENAI_API_KEY`
/// 2. `COLLECTION_RAG_API_KEY`
pub fn get_api_key() -> Result<String> {
    for var in ["OPENAI_API_KEY", "COLLECTION_RAG_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    Err(RagError::authentication(
        PROVIDER_NAME,
        "API key not found. Set OPENAI_API_KEY or COLLECTION_RAG_API_KEY.",
    ))
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================
