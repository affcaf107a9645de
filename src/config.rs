//! 설정 모듈
//!
//! figment로 기본값 → TOML 파일 → 환경변수 순서로 병합합니다.
//! - TOML: `--config <path>` 또는 작업 디렉토리의 `collection-rag.toml`
//! - 환경변수: `COLLECTION_RAG_` 접두사, 섹션 구분자 `__`
//!   (예: `COLLECTION_RAG_RETRIEVAL__K_SEMANTIC=16`)
//!
//! API 키는 설정 파일에 저장하지 않습니다. (`embedding::get_api_key` 참조)

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// 기본 설정 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "collection-rag.toml";

/// 환경변수 접두사
const ENV_PREFIX: &str = "COLLECTION_RAG_";

// ============================================================================
// Data Directory
// ============================================================================

/// 기본 데이터 디렉토리 (~/.local/share/.collection-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".collection-rag")
}

// ============================================================================
// Sections
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 저장소 경로
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
        }
    }
}

impl StorageConfig {
    /// 컬렉션별 벡터 인덱스 루트
    pub fn vector_root(&self) -> PathBuf {
        self.data_dir.join("collections")
    }

    /// 컬렉션별 키워드 인덱스 루트
    pub fn keyword_root(&self) -> PathBuf {
        self.data_dir.join("keyword-index")
    }

    /// 메타데이터 카탈로그 파일
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("collections.json")
    }

    /// 컬렉션 이름별 잠금 파일 디렉토리
    pub fn lock_root(&self) -> PathBuf {
        self.data_dir.join("locks")
    }
}

/// 모델 선택 (표시 이름 기준, `models::SUPPORTED_LLMS` 참조)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub llm: String,
    pub embedding: String,
    pub temperature: f32,
    pub api_base: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            llm: "OpenAI GPT-4o mini".to_string(),
            embedding: "OpenAI text-embedding-3-small".to_string(),
            temperature: 0.0,
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// 검색/인덱싱 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// 벡터 검색 결과 수
    pub k_semantic: usize,
    /// 키워드 검색 결과 수
    pub k_keyword: usize,
    /// 리랭크 후 유지할 결과 수 (없으면 (k_semantic + k_keyword) / 2, 최소 1)
    pub rerank_top_n: Option<usize>,
    /// 청크 크기 (토큰)
    pub chunk_size: usize,
    /// 청크 오버랩 (토큰)
    pub chunk_overlap: usize,
    pub max_keywords_per_chunk: usize,
    pub max_keywords_per_query: usize,
    /// 응답 합성 시 프롬프트 하나에 담을 최대 토큰
    pub context_window_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_semantic: 18,
            k_keyword: 6,
            rerank_top_n: None,
            chunk_size: 800,
            chunk_overlap: 0,
            max_keywords_per_chunk: 10,
            max_keywords_per_query: 10,
            context_window_tokens: 3900,
        }
    }
}

impl RetrievalConfig {
    /// 리랭크 top_n 결정
    pub fn top_n(&self) -> usize {
        self.rerank_top_n
            .map(|n| n.max(1))
            .unwrap_or_else(|| default_top_n(self.k_semantic, self.k_keyword))
    }
}

/// 리랭크 기본 top_n: floor((k_semantic + k_keyword) / 2), 최소 1
pub fn default_top_n(k_semantic: usize, k_keyword: usize) -> usize {
    ((k_semantic + k_keyword) / 2).max(1)
}

/// 에이전트 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// ReAct 루프 (도구 호출 반복)
    #[default]
    React,
    /// 설명 기반 라우팅
    Router,
    /// 하위 질문 분해
    SubQuestion,
}

impl std::str::FromStr for AgentMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "react" => Ok(Self::React),
            "router" => Ok(Self::Router),
            "sub_question" | "subquestion" => Ok(Self::SubQuestion),
            other => Err(RagError::input(format!("Unsupported agent mode: {}", other))),
        }
    }
}

/// 대화 에이전트 기본 시스템 프롬프트
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI teacher, answering questions from students \
of an applied AI course on Large Language Models (LLMs) and Retrieval Augmented Generation (RAG).
Your answers are aimed to teach students, so they should be complete, clear, and easy to understand.
Use the available tools to gather insights pertinent to the question.
Only some information returned by the tools might be relevant to the question, so ignore the \
irrelevant part and answer the question with what you have.
Your responses are exclusively based on the output provided by the tools. Refrain from \
incorporating information not directly obtained from the tool's responses.
Should the tools lack information on the queried topic, politely inform the user that the \
question transcends the bounds of your current knowledge base.
At the end of your answers, invite the students to ask deeper questions about the topic.
If code is provided in the information, share complete code blocks so they can be run as is.
Format your answers in Markdown, including code blocks and snippets.";

/// 에이전트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub mode: AgentMode,
    pub memory_token_limit: usize,
    pub max_iterations: usize,
    /// 대화(chat)에서만 쓰는 시스템 프롬프트 (빈 문자열이면 사용 안 함)
    pub system_prompt: Option<String>,
}

impl AgentConfig {
    /// 비어 있지 않은 시스템 프롬프트
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::default(),
            memory_token_limit: 1500,
            max_iterations: 10,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

/// 로깅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing 기본 레벨 (RUST_LOG가 우선)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl RagConfig {
    /// 설정 로드
    ///
    /// `path`가 없으면 작업 디렉토리의 `collection-rag.toml`을 시도합니다 (없어도 무방).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.is_some() && !file.exists() {
            return Err(RagError::input(format!(
                "Config file not found: {}",
                file.display()
            )));
        }

        let config: RagConfig = Self::figment(&file)
            .extract()
            .map_err(|e| RagError::input(format!("Invalid configuration: {}", e)))?;

        config.validate()?;
        tracing::debug!("Loaded configuration (data_dir={:?})", config.storage.data_dir);
        Ok(config)
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(RagConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 값 검증
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.k_semantic + r.k_keyword == 0 {
            return Err(RagError::input(
                "k_semantic + k_keyword must be greater than zero",
            ));
        }
        if r.chunk_size == 0 {
            return Err(RagError::input("chunk_size must be greater than zero"));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(RagError::input(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
