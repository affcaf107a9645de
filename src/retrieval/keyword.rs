//! 키워드 검색기

use std::sync::Arc;

use async_trait::async_trait;

use super::Retriever;
use crate::error::Result;
use crate::knowledge::{simple_extract_keywords, CollectionHandle, KeywordIndex, ScoredPassage};

/// 컬렉션 키워드 테이블 검색기
///
/// 질의 시에는 언어 모델을 부르지 않습니다.
pub struct KeywordRetriever {
    index: Arc<KeywordIndex>,
    num_chunks: usize,
    max_keywords: usize,
}

impl KeywordRetriever {
    pub fn new(handle: &CollectionHandle, num_chunks: usize, max_keywords: usize) -> Self {
        Self::from_index(handle.keyword.clone(), num_chunks, max_keywords)
    }

    pub fn from_index(index: Arc<KeywordIndex>, num_chunks: usize, max_keywords: usize) -> Self {
        Self {
            index,
            num_chunks,
            max_keywords,
        }
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>> {
        let keywords = simple_extract_keywords(query, self.max_keywords);
        tracing::debug!("Query keywords: {:?}", keywords);

        let results = self.index.search(&keywords, self.num_chunks)?;
        tracing::debug!("Keyword retrieval: {} hit(s)", results.len());
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Passage, PassageMetadata};
    use tempfile::TempDir;

    fn index(dir: &TempDir) -> Arc<KeywordIndex> {
        let entries: Vec<(Passage, Vec<String>)> = [
            ("tokio runtime", vec!["tokio", "runtime"]),
            ("tokio scheduler work stealing", vec!["tokio", "scheduler", "work stealing"]),
            ("sqlite storage", vec!["sqlite", "storage"]),
        ]
        .iter()
        .enumerate()
        .map(|(i, (text, keywords))| {
            (
                Passage::new(
                    i,
                    *text,
                    PassageMetadata {
                        name: format!("doc-{}", i),
                        link: format!("https://example.com/{}", i),
                    },
                ),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect();

        Arc::new(KeywordIndex::create(dir.path(), &entries).unwrap())
    }

    #[tokio::test]
    async fn test_matches_query_terms_without_scores() {
        let dir = TempDir::new().unwrap();
        let retriever = KeywordRetriever::from_index(index(&dir), 6, 10);

        let results = retriever
            .retrieve("How does the Tokio scheduler work?")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.text, "tokio scheduler work stealing");
        assert_eq!(results[1].passage.text, "tokio runtime");
        assert!(results.iter().all(|r| r.score.is_none()));
    }

    #[tokio::test]
    async fn test_truncated_to_num_chunks() {
        let dir = TempDir::new().unwrap();
        let retriever = KeywordRetriever::from_index(index(&dir), 1, 10);

        let results = retriever.retrieve("tokio").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.text, "tokio runtime");
    }

    #[tokio::test]
    async fn test_stopword_only_query_is_empty() {
        let dir = TempDir::new().unwrap();
        let retriever = KeywordRetriever::from_index(index(&dir), 6, 10);
        assert!(retriever.retrieve("what is the").await.unwrap().is_empty());
    }
}
