//! 에러 타입
//!
//! 라이브러리 전체가 공유하는 에러 분류입니다.
//! - 입력 에러: 잘못된 JSON, 없는 파일, 지원하지 않는 소스 타입/모델 이름
//! - 프로바이더 에러: 인증 실패(사용자가 조치 가능)와 그 외 실패를 구분
//! - 저장소 에러: SQLite / LanceDB / 파일 시스템

use thiserror::Error;

/// 라이브러리 Result 별칭
pub type Result<T> = std::result::Result<T, RagError>;

/// collection-rag 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 잘못된 입력 (재시도하지 않고 바로 호출자에게 전달)
    #[error("Invalid input: {0}")]
    Input(String),

    /// 프로바이더 인증 실패 (API 키 확인 필요)
    #[error("Authentication error from {provider}: {message}")]
    Authentication { provider: String, message: String },

    /// 프로바이더 호출 실패 (네트워크, 5xx, 응답 파싱 등)
    #[error("Unexpected error from {provider}: {message}")]
    Provider { provider: String, message: String },

    /// 컬렉션 생성 시 임베딩 모델과 현재 임베딩 모델이 다름
    #[error(
        "Collection '{collection}' was built with embedding model '{stored}', \
         but the active embedding model is '{active}'"
    )]
    EmbeddingMismatch {
        collection: String,
        stored: String,
        active: String,
    },

    /// 카탈로그에는 있지만 인덱스 일부가 디스크에 없음
    #[error("Collection '{name}' is incomplete: missing {missing}")]
    IncompleteCollection { name: String, missing: String },

    /// 인덱스 데이터가 예상한 형태가 아님 (컬럼 누락 등)
    #[error("Index error: {0}")]
    Index(String),

    /// 에이전트가 답을 내지 못함 (반복 한도 초과, 도구 없음 등)
    #[error("Agent error: {0}")]
    Agent(String),

    /// 내부 잠금이 오염됨 (다른 스레드가 잠금 중 패닉)
    #[error("Lock error: {0}")]
    Lock(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("LanceDB error: {0}")]
    Lance(#[from] lancedb::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// 입력 에러 생성 헬퍼
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// 프로바이더 에러 생성 헬퍼
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// 인증 에러 생성 헬퍼
    pub fn authentication(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// 사용자가 API 키를 고쳐야 하는 에러인지
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
