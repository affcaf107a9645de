//! 응답 합성 (compact + refine)
//!
//! Passage 텍스트를 컨텍스트 창에 들어가는 만큼 묶어서 프롬프트 수를 줄입니다.
//! 첫 묶음은 QA 템플릿으로 답을 만들고, 이후 묶음은 refine 템플릿으로
//! 이전 답을 다듬습니다. 토큰 수는 공백 단위 단어 수로 셉니다.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Result;
use crate::knowledge::{Chunker, ChunkConfig, MetadataMode, ScoredPassage, TokenTextSplitter};
use crate::llm::{format_prompt, LanguageModel};

pub const TEXT_QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

pub const REFINE_TEMPLATE: &str = "The original query is as follows: {query_str}\n\
We have provided an existing answer: {existing_answer}\n\
We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
------------\n\
{context_msg}\n\
------------\n\
Given the new context, refine the original answer to better answer the query. \
If the context isn't useful, return the original answer.\n\
Refined Answer: ";

/// Passage가 없을 때의 응답
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// 출력용으로 남겨두는 토큰
const NUM_OUTPUT_TOKENS: usize = 256;

/// 컨텍스트 최소 크기 (질의가 아주 길 때)
const MIN_CONTEXT_TOKENS: usize = 64;

fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// compact + refine 응답 합성기
pub struct ResponseSynthesizer {
    llm: Arc<dyn LanguageModel>,
    context_window_tokens: usize,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>, context_window_tokens: usize) -> Self {
        Self {
            llm,
            context_window_tokens,
        }
    }

    /// 프롬프트 하나에 넣을 수 있는 컨텍스트 토큰 수
    fn context_budget(&self, query: &str, existing_answer: &str) -> usize {
        let template = count_tokens(REFINE_TEMPLATE).max(count_tokens(TEXT_QA_TEMPLATE));
        let fixed = template + count_tokens(query) + count_tokens(existing_answer) + NUM_OUTPUT_TOKENS;
        self.context_window_tokens
            .saturating_sub(fixed)
            .max(MIN_CONTEXT_TOKENS)
    }

    /// 남은 텍스트 앞쪽에서 예산만큼 꺼내 한 묶음으로 합침
    ///
    /// 예산보다 큰 텍스트는 예산 크기로 잘라 앞에 되돌려 넣습니다.
    fn next_chunk(&self, remaining: &mut VecDeque<String>, budget: usize) -> String {
        let mut chunk = String::new();
        let mut chunk_tokens = 0;

        while let Some(text) = remaining.pop_front() {
            let tokens = count_tokens(&text);

            if tokens > budget {
                let splitter = TokenTextSplitter::new(ChunkConfig {
                    chunk_size: budget,
                    chunk_overlap: 0,
                });
                for piece in splitter.chunk(&text).into_iter().rev() {
                    remaining.push_front(piece);
                }
                continue;
            }

            if !chunk.is_empty() && chunk_tokens + tokens > budget {
                remaining.push_front(text);
                break;
            }

            if !chunk.is_empty() {
                chunk.push_str("\n\n");
            }
            chunk.push_str(&text);
            chunk_tokens += tokens;
        }

        chunk
    }

    /// 질의와 Passage로 답변 생성
    pub async fn synthesize(&self, query: &str, passages: &[ScoredPassage]) -> Result<String> {
        let texts: Vec<String> = passages
            .iter()
            .map(|p| p.passage.content(MetadataMode::Llm))
            .collect();

        self.synthesize_texts(query, &texts).await
    }

    /// 임의의 컨텍스트 텍스트로 답변 생성
    ///
    /// 에이전트가 여러 도구의 답변을 하나로 합칠 때도 사용합니다.
    pub async fn synthesize_texts(&self, query: &str, texts: &[String]) -> Result<String> {
        let texts: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();

        if texts.is_empty() {
            return Ok(EMPTY_RESPONSE.to_string());
        }

        tracing::debug!("Synthesizing from {} text(s)", texts.len());

        let mut remaining: VecDeque<String> = texts.into();
        let mut answer: Option<String> = None;
        let mut prompts = 0;

        // 이전 답이 길어질수록 다음 묶음의 예산이 줄어듦
        while !remaining.is_empty() {
            let existing = answer.as_deref().unwrap_or("");
            let budget = self.context_budget(query, existing);
            let chunk = self.next_chunk(&mut remaining, budget);
            if chunk.is_empty() {
                break;
            }

            let prompt = match &answer {
                None => format_prompt(
                    TEXT_QA_TEMPLATE,
                    &[("context_str", chunk.as_str()), ("query_str", query)],
                ),
                Some(existing) => format_prompt(
                    REFINE_TEMPLATE,
                    &[
                        ("query_str", query),
                        ("existing_answer", existing.as_str()),
                        ("context_msg", chunk.as_str()),
                    ],
                ),
            };

            answer = Some(self.llm.complete(&prompt).await?.trim().to_string());
            prompts += 1;
        }

        tracing::debug!("Synthesis used {} prompt(s)", prompts);
        Ok(answer.unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }
}
