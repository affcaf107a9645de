//! 테스트용 결정적 모델
//!
//! 네트워크 없이 컬렉션 생성부터 질의까지 돌리기 위한 가짜 구현체들입니다.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use regex::Regex;
use tempfile::TempDir;

use crate::agent::{load_tools, QueryEngineTool};
use crate::config::{RetrievalConfig, StorageConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::knowledge::{simple_extract_keywords, CollectionStore, DocumentBatch};
use crate::llm::{ChatMessage, LanguageModel, Role};
use crate::models::UserModels;

// ============================================================================
// Embedding
// ============================================================================

/// 단어 해시 bag-of-words 임베딩
///
/// 같은 단어를 많이 공유하는 텍스트일수록 코사인 유사도가 높습니다.
pub struct HashEmbedding {
    name: String,
    dimension: usize,
}

impl HashEmbedding {
    pub const NAME: &'static str = "test-hash-embedding";

    pub fn new() -> Self {
        Self::named(Self::NAME)
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dimension: 64,
        }
    }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimension as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let re = Regex::new(r"\w+").unwrap();
        let mut vector = vec![0.0f32; self.dimension];

        for m in re.find_iter(text) {
            let token = m.as_str().to_lowercase();
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            vector[0] = 1.0;
        } else {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 항상 실패하는 임베딩
pub struct FailingEmbedding;

#[async_trait]
impl EmbeddingProvider for FailingEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::authentication("openai", "Incorrect API key provided"))
    }

    fn dimension(&self) -> usize {
        64
    }

    fn name(&self) -> &str {
        HashEmbedding::NAME
    }
}

// ============================================================================
// Language Models
// ============================================================================

/// 미리 정해둔 응답을 순서대로 돌려주는 모델
///
/// 응답이 떨어지면 마지막 응답을 반복합니다. 받은 메시지는 모두 기록합니다.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            last: Mutex::new(String::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 각 호출의 마지막 메시지 내용
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|messages| messages.last().map(|m| m.content.clone()).unwrap_or_default())
            .collect()
    }

    /// 각 호출의 전체 메시지
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    fn name(&self) -> &str {
        "scripted-llm"
    }
}

/// 프롬프트 종류를 보고 그럴듯하게 답하는 모델
///
/// - 키워드 추출: 빈도 기반 키워드를 `KEYWORDS:` 형식으로
/// - RankGPT: 받은 순서 그대로 `[1] > [2] > ...`
/// - 그 외: 고정 답변
pub struct KeywordingLlm;

impl KeywordingLlm {
    pub const ANSWER: &'static str = "Tokio schedules tasks with work stealing.";
}

#[async_trait]
impl LanguageModel for KeywordingLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let first = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();

        if messages.first().map(|m| m.role) == Some(Role::System) && first.contains("RankGPT") {
            let count = messages
                .iter()
                .filter(|m| m.role == Role::Assistant && m.content.starts_with("Received passage"))
                .count();
            let ranking: Vec<String> = (1..=count).map(|i| format!("[{}]", i)).collect();
            return Ok(ranking.join(" > "));
        }

        if last.contains("Provide keywords in the following comma-separated format") {
            let body = last
                .split("---------------------")
                .nth(1)
                .unwrap_or_default();
            let keywords = simple_extract_keywords(body, 10);
            return Ok(format!("KEYWORDS: {}", keywords.join(", ")));
        }

        Ok(Self::ANSWER.to_string())
    }

    fn name(&self) -> &str {
        "keywording-llm"
    }
}

/// 항상 실패하는 모델
pub struct FailingLlm {
    authentication: bool,
}

impl FailingLlm {
    pub fn network() -> Self {
        Self {
            authentication: false,
        }
    }

    pub fn authentication() -> Self {
        Self {
            authentication: true,
        }
    }
}

#[async_trait]
impl LanguageModel for FailingLlm {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        if self.authentication {
            Err(RagError::authentication("openai", "Incorrect API key provided"))
        } else {
            Err(RagError::provider("openai", "connection reset by peer"))
        }
    }

    fn name(&self) -> &str {
        "failing-llm"
    }
}

/// 컬렉션 생성/질의용 기본 모델 묶음
pub fn test_models() -> UserModels {
    UserModels::new(Arc::new(KeywordingLlm), Arc::new(HashEmbedding::new()))
}

// ============================================================================
// Fixtures
// ============================================================================

const TOKIO_NOTES: &str = r#"{
    "description": "Notes about the Tokio async runtime",
    "data": [
        {"Name": "Tokio", "Link": "https://tokio.rs", "Content": "Tokio schedules asynchronous tasks using a work stealing scheduler across worker threads."},
        {"Name": "Async Book", "Link": "https://rust-lang.github.io/async-book", "Content": "Futures in Rust are lazy and make progress only when polled by an executor."}
    ]
}"#;

const STORAGE_NOTES: &str = r#"{
    "description": "Notes about embedded storage engines",
    "data": [
        {"Name": "SQLite", "Link": "https://sqlite.org", "Content": "SQLite is an embedded relational database engine that stores data in a single file."},
        {"Name": "LanceDB", "Link": "https://lancedb.com", "Content": "LanceDB persists embeddings in columnar lance files and answers nearest neighbor queries."}
    ]
}"#;

/// `tokio_notes`, `storage_notes` 두 컬렉션을 만들고 도구로 로드
pub async fn sample_tools(dir: &TempDir) -> Vec<QueryEngineTool> {
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
    };
    let store = CollectionStore::open(&storage, &RetrievalConfig::default()).unwrap();
    let models = test_models();

    for (name, json) in [("tokio_notes", TOKIO_NOTES), ("storage_notes", STORAGE_NOTES)] {
        let batch = DocumentBatch::from_json(json).unwrap();
        store.create(name, &batch, &models).await.unwrap();
    }

    let names = vec!["tokio_notes".to_string(), "storage_notes".to_string()];
    load_tools(&store, &names, &models).await.unwrap()
}
