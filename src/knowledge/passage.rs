//! Passage (노드) - 검색 단위 청크
//!
//! 인덱스 구축 시 한 번 만들어지고 이후 변경되지 않습니다.
//! ID는 (출처 링크, 청크 위치, 청크 텍스트)의 SHA-256이라
//! 같은 입력을 다시 인덱싱하면 같은 ID가 나옵니다.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Types
// ============================================================================

/// 출처 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// 문서 이름 (언어 모델에 전달하는 텍스트에서는 제외)
    pub name: String,
    /// 문서 링크 (임베딩/언어 모델 텍스트 모두에서 제외, 표시용)
    pub link: String,
}

/// 메타데이터 포함 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMode {
    /// 모든 메타데이터 포함
    All,
    /// 언어 모델용 (Name, Link 제외)
    Llm,
    /// 임베딩 모델용 (Link 제외)
    Embed,
    /// 메타데이터 없음
    None,
}

/// 검색 단위 청크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// 안정적인 고유 ID (hex SHA-256)
    pub id: String,
    /// 컬렉션 내 순서 (0-based, 인덱싱 순서)
    pub position: usize,
    /// 청크 텍스트
    pub text: String,
    /// 출처 메타데이터
    pub metadata: PassageMetadata,
}

/// 스코어가 붙은 Passage
///
/// 키워드 검색 결과는 스코어가 없습니다 (`None`은 0점이 아님).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: Option<f32>,
}

// ============================================================================
// Passage
// ============================================================================

impl Passage {
    /// 새 Passage 생성 (ID 자동 계산)
    pub fn new(position: usize, text: impl Into<String>, metadata: PassageMetadata) -> Self {
        let text = text.into();
        let id = passage_id(&metadata.link, position, &text);
        Self {
            id,
            position,
            text,
            metadata,
        }
    }

    /// 모드에 맞는 메타데이터를 붙인 콘텐츠
    ///
    /// 포함되는 메타데이터는 `key: value` 줄, 빈 줄, 본문 순서로 렌더링합니다.
    pub fn content(&self, mode: MetadataMode) -> String {
        let mut lines = Vec::new();

        match mode {
            MetadataMode::All => {
                lines.push(format!("Name: {}", self.metadata.name));
                lines.push(format!("Link: {}", self.metadata.link));
            }
            MetadataMode::Embed => {
                lines.push(format!("Name: {}", self.metadata.name));
            }
            MetadataMode::Llm | MetadataMode::None => {}
        }

        if lines.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\n{}", lines.join("\n"), self.text)
        }
    }
}

impl ScoredPassage {
    pub fn new(passage: Passage, score: Option<f32>) -> Self {
        Self { passage, score }
    }

    /// 스코어 없는 결과 (키워드 검색)
    pub fn unscored(passage: Passage) -> Self {
        Self {
            passage,
            score: None,
        }
    }

    /// Passage ID
    pub fn id(&self) -> &str {
        &self.passage.id
    }
}

/// Passage ID 계산
pub fn passage_id(link: &str, position: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    hasher.update([0u8]);
    hasher.update(position.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
