//! 모델 카탈로그
//!
//! UI/설정에 노출되는 표시 이름을 실제 프로바이더 모델로 매핑합니다.
//! 컬렉션 카탈로그에는 임베딩 모델의 표시 이름이 저장됩니다.

use std::sync::Arc;

use crate::config::ModelsConfig;
use crate::embedding::{get_api_key, EmbeddingProvider, OpenAiEmbedding};
use crate::error::{RagError, Result};
use crate::llm::{LanguageModel, OpenAiChat};
use crate::provider::OpenAiTransport;

/// 지원하는 언어 모델 (표시 이름, API 모델 ID)
pub const SUPPORTED_LLMS: &[(&str, &str)] = &[
    ("OpenAI GPT-4o mini", "gpt-4o-mini"),
    ("OpenAI GPT-4o", "gpt-4o"),
];

/// 지원하는 임베딩 모델 (표시 이름, API 모델 ID, 차원)
pub const SUPPORTED_EMBEDDINGS: &[(&str, &str, usize)] =
    &[("OpenAI text-embedding-3-small", "text-embedding-3-small", 1536)];

/// 언어 모델 표시 이름 → API 모델 ID
pub fn resolve_llm(name: &str) -> Result<&'static str> {
    SUPPORTED_LLMS
        .iter()
        .find(|(display, _)| *display == name)
        .map(|(_, model)| *model)
        .ok_or_else(|| RagError::input(format!("Selected LLM name is not supported: {}", name)))
}

/// 임베딩 표시 이름 → (API 모델 ID, 차원)
pub fn resolve_embedding(name: &str) -> Result<(&'static str, usize)> {
    SUPPORTED_EMBEDDINGS
        .iter()
        .find(|(display, _, _)| *display == name)
        .map(|(_, model, dim)| (*model, *dim))
        .ok_or_else(|| {
            RagError::input(format!("Selected embedding name is not supported: {}", name))
        })
}

/// 사용자가 선택한 모델 묶음
///
/// 컬렉션 생성과 쿼리 엔진이 같은 인스턴스를 공유합니다.
#[derive(Clone)]
pub struct UserModels {
    pub llm: Arc<dyn LanguageModel>,
    pub embedding: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for UserModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserModels")
            .field("llm", &self.llm.name())
            .field("embedding", &self.embedding.name())
            .finish()
    }
}

impl UserModels {
    /// 이미 만들어진 모델로 구성
    pub fn new(llm: Arc<dyn LanguageModel>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
        Self { llm, embedding }
    }

    /// 설정과 환경변수 API 키로 구성
    ///
    /// # Arguments
    /// * `config` - 모델 설정
    /// * `system_prompt` - 언어 모델 기본 시스템 프롬프트
    pub fn from_config(config: &ModelsConfig, system_prompt: Option<&str>) -> Result<Self> {
        let api_key = get_api_key()?;
        Self::with_api_key(config, api_key, system_prompt)
    }

    /// API 키를 직접 지정해서 구성
    pub fn with_api_key(
        config: &ModelsConfig,
        api_key: String,
        system_prompt: Option<&str>,
    ) -> Result<Self> {
        let llm_model = resolve_llm(&config.llm)?;
        let (embed_model, dimension) = resolve_embedding(&config.embedding)?;

        let transport = OpenAiTransport::new(api_key, &config.api_base)?;

        let mut llm = OpenAiChat::new(
            transport.clone(),
            config.llm.clone(),
            llm_model,
            config.temperature,
        );
        if let Some(prompt) = system_prompt {
            llm = llm.with_system_prompt(prompt);
        }

        let embedding =
            OpenAiEmbedding::new(transport, config.embedding.clone(), embed_model, dimension);

        tracing::info!(
            "Using LLM '{}' ({}) and embedding '{}' ({}, dim {})",
            config.llm,
            llm_model,
            config.embedding,
            embed_model,
            dimension
        );

        Ok(Self {
            llm: Arc::new(llm),
            embedding: Arc::new(embedding),
        })
    }
}
