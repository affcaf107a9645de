//! 키워드 추출
//!
//! - 인덱스 구축 시: 언어 모델이 청크마다 키워드를 뽑고, 여러 단어 키워드는
//!   불용어를 뺀 하위 토큰으로 확장합니다.
//! - 쿼리 시: 언어 모델 없이 빈도 기반으로 뽑습니다 (`simple_extract_keywords`).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;
use crate::llm::{format_prompt, LanguageModel};

/// 영어 불용어 (NLTK english 목록)
pub const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

/// 언어 모델 키워드 추출 프롬프트
pub const KEYWORD_EXTRACT_TEMPLATE: &str = "Some text is provided below. Given the text, \
extract up to {max_keywords} keywords from the text. Avoid stopwords.\n\
---------------------\n\
{text}\n\
---------------------\n\
Provide keywords in the following comma-separated format: 'KEYWORDS: <keywords>'\n";

const KEYWORDS_PREFIX: &str = "KEYWORDS:";

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

fn word_regex() -> Regex {
    Regex::new(r"\w+").expect("valid word regex")
}

// ============================================================================
// Frequency-based (query time)
// ============================================================================

/// 빈도 기반 키워드 추출
///
/// `\w+` 토큰을 소문자로 바꾸고 불용어를 뺀 뒤 빈도 내림차순으로
/// 최대 `max_keywords`개를 반환합니다. 빈도가 같으면 먼저 나온 토큰이 앞에 옵니다.
pub fn simple_extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let re = word_regex();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for m in re.find_iter(text) {
        let token = m.as_str().to_lowercase();
        if is_stopword(&token) {
            continue;
        }
        let count = counts.entry(token.clone()).or_insert(0);
        if *count == 0 {
            order.push(token);
        }
        *count += 1;
    }

    // sort_by는 안정 정렬이라 동률은 등장 순서 유지
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(max_keywords);
    order
}

// ============================================================================
// LLM response parsing (index time)
// ============================================================================

/// 여러 단어 키워드를 불용어가 아닌 하위 토큰으로 확장
///
/// 원래 키워드는 그대로 유지하고 중복은 제거합니다.
pub fn expand_with_subtokens(keywords: &[String]) -> Vec<String> {
    let re = word_regex();
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for keyword in keywords {
        if seen.insert(keyword.clone()) {
            results.push(keyword.clone());
        }

        let sub_tokens: Vec<&str> = re.find_iter(keyword).map(|m| m.as_str()).collect();
        if sub_tokens.len() > 1 {
            for token in sub_tokens {
                if !is_stopword(token) && seen.insert(token.to_string()) {
                    results.push(token.to_string());
                }
            }
        }
    }

    results
}

/// `KEYWORDS: a, b, c` 형식의 응답 파싱
pub fn parse_keyword_response(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    let body = trimmed.strip_prefix(KEYWORDS_PREFIX).unwrap_or(trimmed);

    let keywords: Vec<String> = body
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    expand_with_subtokens(&keywords)
}

// ============================================================================
// KeywordExtractor
// ============================================================================

/// 인덱스 구축용 키워드 추출기
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<String>>;
}

/// 언어 모델 기반 키워드 추출기
pub struct LlmKeywordExtractor {
    llm: Arc<dyn LanguageModel>,
    max_keywords: usize,
}

impl LlmKeywordExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, max_keywords: usize) -> Self {
        Self { llm, max_keywords }
    }

    fn prompt(&self, text: &str) -> String {
        format_prompt(
            KEYWORD_EXTRACT_TEMPLATE,
            &[("max_keywords", self.max_keywords.to_string().as_str()), ("text", text)],
        )
    }
}

#[async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let response = self.llm.complete(&self.prompt(text)).await?;
        Ok(parse_keyword_response(&response))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;

    #[test]
    fn test_simple_extract_removes_stopwords() {
        let keywords = simple_extract_keywords("What is the attention mechanism?", 10);
        assert_eq!(keywords, vec!["attention", "mechanism"]);
    }

    #[test]
    fn test_simple_extract_orders_by_frequency() {
        let keywords =
            simple_extract_keywords("rust tokio rust async tokio rust", 10);
        assert_eq!(keywords, vec!["rust", "tokio", "async"]);
    }

    #[test]
    fn test_simple_extract_limit() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        assert_eq!(simple_extract_keywords(text, 10).len(), 10);
        assert_eq!(simple_extract_keywords(text, 3), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_simple_extract_lowercases() {
        assert_eq!(simple_extract_keywords("LanceDB lancedb", 10), vec!["lancedb"]);
    }

    #[test]
    fn test_parse_response_with_prefix() {
        let keywords = parse_keyword_response("KEYWORDS: Vector Search, LanceDB");
        assert_eq!(keywords, vec!["vector search", "vector", "search", "lancedb"]);
    }

    #[test]
    fn test_parse_response_without_prefix() {
        let keywords = parse_keyword_response("rust, , tokio");
        assert_eq!(keywords, vec!["rust", "tokio"]);
    }

    #[test]
    fn test_expand_skips_stopword_subtokens() {
        let keywords = expand_with_subtokens(&["state of the art".to_string()]);
        assert_eq!(keywords, vec!["state of the art", "state", "art"]);
    }

    #[tokio::test]
    async fn test_llm_extractor_prompt_and_parse() {
        let llm = Arc::new(ScriptedLlm::new(vec!["KEYWORDS: hybrid retrieval, bm25"]));
        let extractor = LlmKeywordExtractor::new(llm.clone(), 5);

        let keywords = extractor.extract("Hybrid retrieval mixes bm25 and vectors").await.unwrap();
        assert_eq!(keywords, vec!["hybrid retrieval", "hybrid", "retrieval", "bm25"]);

        let prompts = llm.prompts();
        assert!(prompts[0].contains("extract up to 5 keywords"));
        assert!(prompts[0].contains("Hybrid retrieval mixes bm25 and vectors"));
    }
}
