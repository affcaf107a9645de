//! Text Chunking Module
//!
//! 공백 단위 토큰 기준으로 문서를 고정 크기 청크로 나눕니다.
//! 청크는 원문을 그대로 잘라낸 조각이라 청크 내부의 줄바꿈/들여쓰기가 유지됩니다.

use regex::Regex;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 청크 당 최대 토큰 수
    pub chunk_size: usize,
    /// 인접 청크 간 겹치는 토큰 수
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 0,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// TokenTextSplitter
// ============================================================================

/// 토큰(공백 구분 단어) 개수 기준 청커
pub struct TokenTextSplitter {
    config: ChunkConfig,
    token_re: Regex,
}

impl TokenTextSplitter {
    /// 설정으로 생성
    ///
    /// `chunk_overlap >= chunk_size`면 진행이 불가능하므로 `chunk_size - 1`로 줄입니다.
    pub fn new(config: ChunkConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let chunk_overlap = config.chunk_overlap.min(chunk_size - 1);

        Self {
            config: ChunkConfig {
                chunk_size,
                chunk_overlap,
            },
            token_re: Regex::new(r"\S+").expect("valid token regex"),
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }
}

impl Chunker for TokenTextSplitter {
    fn chunk(&self, text: &str) -> Vec<String> {
        let spans: Vec<(usize, usize)> = self
            .token_re
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();

        if spans.is_empty() {
            return vec![];
        }

        let step = self.config.chunk_size - self.config.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(spans.len());
            chunks.push(text[spans[start].0..spans[end - 1].1].to_string());

            if end == spans.len() {
                break;
            }
            start += step;
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "TokenTextSplitter"
    }
}

/// 앞에서부터 최대 `max_words` 단어만 남김
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
