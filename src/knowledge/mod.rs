//! Knowledge 모듈 - 컬렉션 단위 이중 인덱스 저장소
//!
//! - LanceDB: Passage 임베딩 (코사인 유사도 검색)
//! - SQLite: 언어 모델이 뽑은 Passage별 키워드 테이블
//! - Catalog: 어떤 컬렉션이 존재하는지에 대한 유일한 기준 (`collections.json`)
//! - Chunker: 공백 토큰 기준 고정 크기 분할
//! - Lock: 프로세스 간 파일 잠금 (카탈로그 갱신, 이름별 생성/삭제)

mod catalog;
mod chunker;
mod ingest;
mod keyword;
mod keywords;
mod lance;
mod lock;
mod passage;
mod store;

// Re-exports
pub use catalog::{Catalog, CollectionRecord};
pub use chunker::{truncate_words, ChunkConfig, Chunker, TokenTextSplitter};
pub use ingest::{DocumentBatch, SourceDocument, SourceType};
pub use keyword::KeywordIndex;
pub use keywords::{
    expand_with_subtokens, parse_keyword_response, simple_extract_keywords, KeywordExtractor,
    LlmKeywordExtractor, KEYWORD_EXTRACT_TEMPLATE, STOPWORDS,
};
pub use lance::LanceVectorIndex;
pub use lock::{FileLock, LockMode};
pub use passage::{passage_id, MetadataMode, Passage, PassageMetadata, ScoredPassage};
pub use store::{
    collection_name_from_path, format_collection_name, CollectionHandle, CollectionStore,
    StoreStats,
};
