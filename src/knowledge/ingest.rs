//! 수집 입력 (스크레이퍼 출력 JSON)
//!
//! ```json
//! {"description": "...", "data": [{"Name": "...", "Link": "https://...", "Content": "..."}]}
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::chunker::Chunker;
use super::passage::{Passage, PassageMetadata};
use crate::error::{RagError, Result};

/// 입력 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Webpages,
    Pdfs,
}

impl FromStr for SourceType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "webpages" => Ok(Self::Webpages),
            "pdfs" => Ok(Self::Pdfs),
            _ => Err(RagError::input(format!(
                "Selected type of JSON file is incorrect: {} (expected Webpages or PDFs)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webpages => write!(f, "Webpages"),
            Self::Pdfs => write!(f, "PDFs"),
        }
    }
}

/// 원본 문서 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Link")]
    pub link: String,
    /// 스크레이퍼가 채운 본문 (가져오지 못했으면 비어 있음)
    #[serde(rename = "Content", default)]
    pub content: String,
}

/// 수집 배치
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentBatch {
    #[serde(default)]
    pub description: String,
    pub data: Vec<SourceDocument>,
}

impl DocumentBatch {
    /// JSON 파일에서 읽기
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::input(format!("The file was not found: {} ({})", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| RagError::input(format!("Invalid JSON format: {} ({})", path.display(), e)))
    }

    /// JSON 문자열에서 읽기
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| RagError::input(e.to_string()))
    }

    /// 인덱싱 가능한 문서만
    ///
    /// 본문이 비었거나 `Link`가 URL이 아닌 문서는 경고 후 제외하고,
    /// 남는 문서가 없으면 입력 에러입니다.
    pub fn usable_documents(&self) -> Result<Vec<&SourceDocument>> {
        let mut usable = Vec::with_capacity(self.data.len());

        for doc in &self.data {
            if let Err(e) = url::Url::parse(&doc.link) {
                tracing::warn!("Skipping '{}' ({}): invalid link: {}", doc.name, doc.link, e);
                continue;
            }

            if doc.content.trim().is_empty() {
                tracing::warn!("Skipping '{}' ({}): empty content", doc.name, doc.link);
                continue;
            }

            usable.push(doc);
        }

        if usable.is_empty() {
            return Err(RagError::input("No documents with content to index"));
        }

        Ok(usable)
    }

    /// Passage로 분할 (position은 배치 전체에서 0부터 연속)
    pub fn split_into_passages(&self, chunker: &dyn Chunker) -> Result<Vec<Passage>> {
        let mut passages = Vec::new();

        for doc in self.usable_documents()? {
            for chunk in chunker.chunk(&doc.content) {
                let position = passages.len();
                passages.push(Passage::new(
                    position,
                    chunk,
                    PassageMetadata {
                        name: doc.name.clone(),
                        link: doc.link.clone(),
                    },
                ));
            }
        }

        Ok(passages)
    }
}
