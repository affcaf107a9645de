//! 라우터 에이전트
//!
//! 도구 설명 목록을 보여주고 질문에 필요한 도구를 고르게 한 뒤, 고른 도구만 질의합니다.
//! 여러 도구를 고르면 각 답변을 다시 하나로 합칩니다.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;

use super::{condense_question, extract_json, Agent, AgentResponse, ChatMemory, QueryEngineTool};
use crate::error::Result;
use crate::llm::{format_prompt, LanguageModel};
use crate::retrieval::ResponseSynthesizer;

const SELECT_TEMPLATE: &str = "Some choices are given below. It is provided in a numbered list \
(1 to {num_choices}), where each item in the list corresponds to a summary.
---------------------
{context_list}
---------------------
Using only the choices above and not prior knowledge, return the top choices (no more than \
{max_outputs}, but only select what is needed) that are most relevant to the question: '{query_str}'

The output should be ONLY a JSON array formatted like the example below.
[{\"choice\": 1, \"reason\": \"<reason>\"}, {\"choice\": 2, \"reason\": \"<reason>\"}]
";

#[derive(Debug, Deserialize)]
struct Selection {
    choice: i64,
}

/// 선택 응답을 0-based 도구 번호로 변환
///
/// 범위 밖 번호와 중복은 버립니다.
pub fn parse_selections(response: &str, num_choices: usize) -> Vec<usize> {
    let Some(json) = extract_json(response, '[', ']') else {
        return vec![];
    };
    let Ok(selections) = serde_json::from_str::<Vec<Selection>>(json) else {
        return vec![];
    };

    let mut seen = HashSet::new();
    selections
        .into_iter()
        .filter_map(|s| usize::try_from(s.choice).ok())
        .filter_map(|c| c.checked_sub(1))
        .filter(|&i| i < num_choices)
        .filter(|&i| seen.insert(i))
        .collect()
}

/// 라우터 에이전트
pub struct RouterAgent {
    llm: Arc<dyn LanguageModel>,
    tools: Vec<QueryEngineTool>,
    memory: ChatMemory,
    synthesizer: ResponseSynthesizer,
}

impl RouterAgent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        tools: Vec<QueryEngineTool>,
        memory: ChatMemory,
        context_window_tokens: usize,
    ) -> Self {
        let synthesizer = ResponseSynthesizer::new(llm.clone(), context_window_tokens);
        Self {
            llm,
            tools,
            memory,
            synthesizer,
        }
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    /// 질문에 쓸 도구 선택
    ///
    /// 도구가 하나뿐이면 묻지 않고, 선택을 해석하지 못하면 모든 도구를 씁니다.
    async fn select(&self, query: &str) -> Result<Vec<&QueryEngineTool>> {
        if self.tools.len() == 1 {
            return Ok(self.tools.iter().collect());
        }

        let context_list = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, t)| format!("({}) {}", i + 1, t.description))
            .collect::<Vec<_>>()
            .join("\n\n");

        let num_choices = self.tools.len().to_string();
        let prompt = format_prompt(
            SELECT_TEMPLATE,
            &[
                ("num_choices", num_choices.as_str()),
                ("context_list", context_list.as_str()),
                ("max_outputs", num_choices.as_str()),
                ("query_str", query),
            ],
        );

        let response = self.llm.complete(&prompt).await?;
        let selected = parse_selections(&response, self.tools.len());

        if selected.is_empty() {
            tracing::warn!("Could not parse tool selection, querying all tools");
            return Ok(self.tools.iter().collect());
        }

        Ok(selected.into_iter().map(|i| &self.tools[i]).collect())
    }
}

#[async_trait]
impl Agent for RouterAgent {
    async fn answer(&mut self, query: &str) -> Result<AgentResponse> {
        let question = condense_question(self.llm.as_ref(), &self.memory, query).await?;
        let selected = self.select(&question).await?;

        let names: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
        tracing::info!("Router selected tool(s): {:?}", names);

        let results = try_join_all(selected.iter().map(|t| t.call(&question))).await?;

        let answer = if results.len() == 1 {
            results[0].response.clone()
        } else {
            let texts: Vec<String> = results.iter().map(|r| r.response.clone()).collect();
            self.synthesizer.synthesize_texts(&question, &texts).await?
        };

        self.memory.put_turn(query, &answer);
        Ok(AgentResponse {
            response: answer,
            sources: results.into_iter().flat_map(|r| r.source_nodes).collect(),
        })
    }

    fn reset(&mut self) {
        self.memory.reset();
    }

    fn name(&self) -> &'static str {
        "router"
    }
}
