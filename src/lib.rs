//! collection-rag - 컬렉션 기반 하이브리드 RAG 지식베이스
//!
//! 문서 묶음마다 LanceDB 벡터 인덱스와 SQLite 키워드 테이블을 만들고,
//! 두 검색 결과를 병합 → LLM 리랭크 → 응답 합성으로 답합니다.

pub mod agent;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod provider;
pub mod retrieval;

#[cfg(test)]
mod test_support;

// Re-exports
pub use agent::{build_agent, load_tools, Agent, AgentResponse, ChatMemory, QueryEngineTool};
pub use config::{AgentMode, RagConfig, RetrievalConfig, StorageConfig};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, OpenAiEmbedding};
pub use error::{RagError, Result};
pub use knowledge::{
    CollectionHandle, CollectionRecord, CollectionStore, DocumentBatch, Passage, ScoredPassage,
    SourceType, StoreStats,
};
pub use llm::{ChatMessage, LanguageModel, OpenAiChat};
pub use models::UserModels;
pub use retrieval::{
    fuse, HybridQueryEngine, HybridRetriever, QueryResponse, RankGptReranker, Retriever,
    ResponseSynthesizer, SourceNode,
};
