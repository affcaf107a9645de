//! LLM 리랭커 (RankGPT 방식 listwise 프롬프트)
//!
//! 후보를 한 번에 보여주고 `[2] > [1] > [3]` 형식의 순위를 받습니다.
//! 응답에서 숫자만 읽고, 중복/범위 밖 번호는 버리고, 언급되지 않은 후보는
//! 병합 순서대로 뒤에 붙인 다음 top_n개를 남깁니다.
//!
//! ref: https://arxiv.org/abs/2304.09542

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::knowledge::{truncate_words, MetadataMode, ScoredPassage};
use crate::llm::{ChatMessage, LanguageModel};

/// 후보 하나당 프롬프트에 넣는 최대 단어 수
pub const MAX_PASSAGE_WORDS: usize = 300;

const SYSTEM_PROMPT: &str = "You are RankGPT, an intelligent assistant that can rank passages \
based on their relevancy to the query.";

const ACK_PROMPT: &str = "Okay, please provide the passages.";

fn prefix_prompt(query: &str, num: usize) -> String {
    format!(
        "I will provide you with {} passages, each indicated by number identifier []. \n\
         Rank the passages based on their relevance to query: {}.",
        num, query
    )
}

fn post_prompt(query: &str, num: usize) -> String {
    format!(
        "Search Query: {}. \nRank the {} passages above based on their relevance to the \
         search query. The passages should be listed in descending order using identifiers. \
         The most relevant passages should be listed first. The output format should be [] > [], \
         e.g., [1] > [2]. Only response the ranking results, do not say any word or explain.",
        query, num
    )
}

/// 순위 응답을 0-based 순열로 변환
///
/// 숫자가 아닌 문자는 모두 구분자로 취급합니다.
pub fn parse_permutation(response: &str, num_candidates: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut order: Vec<usize> = response
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse::<usize>().ok())
        .filter_map(|n| n.checked_sub(1))
        .filter(|&i| i < num_candidates)
        .filter(|&i| seen.insert(i))
        .collect();

    order.extend((0..num_candidates).filter(|i| !seen.contains(i)));
    order
}

/// RankGPT 리랭커
pub struct RankGptReranker {
    llm: Arc<dyn LanguageModel>,
    top_n: usize,
}

impl RankGptReranker {
    /// `top_n`은 최소 1로 올립니다.
    pub fn new(llm: Arc<dyn LanguageModel>, top_n: usize) -> Self {
        Self {
            llm,
            top_n: top_n.max(1),
        }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    fn messages(&self, query: &str, candidates: &[ScoredPassage]) -> Vec<ChatMessage> {
        let num = candidates.len();
        let mut messages = Vec::with_capacity(num * 2 + 4);

        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.push(ChatMessage::user(prefix_prompt(query, num)));
        messages.push(ChatMessage::assistant(ACK_PROMPT));

        for (i, candidate) in candidates.iter().enumerate() {
            let rank = i + 1;
            let content = candidate.passage.content(MetadataMode::None);
            let content = truncate_words(content.trim(), MAX_PASSAGE_WORDS);
            messages.push(ChatMessage::user(format!("[{}] {}", rank, content)));
            messages.push(ChatMessage::assistant(format!("Received passage [{}].", rank)));
        }

        messages.push(ChatMessage::user(post_prompt(query, num)));
        messages
    }

    /// 후보 재정렬 후 top_n개 반환
    ///
    /// 언어 모델 호출이 실패하면 그대로 에러를 돌려줍니다.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredPassage>,
    ) -> Result<Vec<ScoredPassage>> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let response = self.llm.chat(&self.messages(query, &candidates)).await?;
        let permutation = parse_permutation(&response, candidates.len());
        tracing::debug!("Rerank permutation: {:?}", permutation);

        let mut slots: Vec<Option<ScoredPassage>> = candidates.into_iter().map(Some).collect();
        let reranked: Vec<ScoredPassage> = permutation
            .into_iter()
            .filter_map(|i| slots[i].take())
            .take(self.top_n)
            .collect();

        tracing::info!("Reranked {} -> {} passages", slots.len(), reranked.len());
        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_top_n;
    use crate::knowledge::{Passage, PassageMetadata};
    use crate::llm::Role;
    use crate::test_support::{FailingLlm, ScriptedLlm};

    fn candidates(n: usize) -> Vec<ScoredPassage> {
        (0..n)
            .map(|i| {
                let passage = Passage::new(
                    i,
                    format!("passage number {}", i),
                    PassageMetadata {
                        name: format!("doc-{}", i),
                        link: format!("https://example.com/{}", i),
                    },
                );
                let score = if i % 2 == 0 { Some(0.5) } else { None };
                ScoredPassage::new(passage, score)
            })
            .collect()
    }

    fn texts(results: &[ScoredPassage]) -> Vec<&str> {
        results.iter().map(|r| r.passage.text.as_str()).collect()
    }

    #[test]
    fn test_parse_permutation() {
        assert_eq!(parse_permutation("[2] > [3] > [1]", 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_parse_permutation_fills_missing_in_order() {
        assert_eq!(parse_permutation("[3]", 4), vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_parse_permutation_drops_invalid() {
        assert_eq!(
            parse_permutation("[0] > [2] > [2] > [9] > [99999999999999999999999]", 3),
            vec![1, 0, 2]
        );
        assert_eq!(parse_permutation("I cannot rank these.", 2), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_rerank_reorders_and_truncates() {
        let llm = Arc::new(ScriptedLlm::new(vec!["[3] > [1] > [2]"]));
        let reranker = RankGptReranker::new(llm, 2);

        let results = reranker.rerank("query", candidates(3)).await.unwrap();
        assert_eq!(texts(&results), vec!["passage number 2", "passage number 0"]);
        // 원래 스코어 유지
        assert_eq!(results[0].score, Some(0.5));
    }

    #[tokio::test]
    async fn test_budget_property() {
        let top_n = default_top_n(18, 6);
        assert_eq!(top_n, 12);

        for n in [0usize, 1, 5, 12, 21] {
            let llm = Arc::new(ScriptedLlm::new(vec!["[1] > [2]"]));
            let reranker = RankGptReranker::new(llm, top_n);
            let results = reranker.rerank("query", candidates(n)).await.unwrap();
            assert_eq!(results.len(), n.min(top_n));
        }
    }

    #[test]
    fn test_top_n_never_zero() {
        let reranker = RankGptReranker::new(Arc::new(FailingLlm::network()), 0);
        assert_eq!(reranker.top_n(), 1);
        assert_eq!(default_top_n(0, 1), 1);
    }

    #[tokio::test]
    async fn test_prompt_layout() {
        let llm = Arc::new(ScriptedLlm::new(vec!["[1]"]));
        let reranker = RankGptReranker::new(llm.clone(), 12);
        reranker.rerank("what is tokio", candidates(2)).await.unwrap();

        let calls = llm.calls();
        let messages = &calls[0];
        assert_eq!(messages.len(), 2 * 2 + 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("I will provide you with 2 passages"));
        assert_eq!(messages[3].content, "[1] passage number 0");
        assert_eq!(messages[4].content, "Received passage [1].");
        assert!(messages[7].content.starts_with("Search Query: what is tokio."));
        // 이름/링크는 프롬프트에 없음
        assert!(!messages.iter().any(|m| m.content.contains("https://example.com")));
    }

    #[tokio::test]
    async fn test_long_passage_capped() {
        let long = vec!["word"; 500].join(" ");
        let candidate = ScoredPassage::unscored(Passage::new(
            0,
            long,
            PassageMetadata {
                name: "n".to_string(),
                link: "https://example.com".to_string(),
            },
        ));

        let llm = Arc::new(ScriptedLlm::new(vec!["[1]"]));
        let reranker = RankGptReranker::new(llm.clone(), 1);
        reranker.rerank("q", vec![candidate]).await.unwrap();

        let passage_message = &llm.calls()[0][3].content;
        assert_eq!(passage_message.split_whitespace().count(), 1 + MAX_PASSAGE_WORDS);
    }

    #[tokio::test]
    async fn test_llm_failure_is_hard_error() {
        let reranker = RankGptReranker::new(Arc::new(FailingLlm::network()), 12);
        let result = reranker.rerank("query", candidates(3)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_llm() {
        let reranker = RankGptReranker::new(Arc::new(FailingLlm::network()), 12);
        assert!(reranker.rerank("query", vec![]).await.unwrap().is_empty());
    }
}
