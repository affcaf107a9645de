//! 하위 질문 분해 에이전트
//!
//! 질문을 도구별 하위 질문(JSON)으로 나누고, 하위 질문을 동시에 질의한 뒤
//! 하위 답변들을 컨텍스트로 최종 답변을 합성합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use super::{condense_question, extract_json, Agent, AgentResponse, ChatMemory, QueryEngineTool};
use crate::error::Result;
use crate::llm::{format_prompt, LanguageModel};
use crate::retrieval::ResponseSynthesizer;

const DECOMPOSE_TEMPLATE: &str = "Given a user question, and a list of tools, output a list of \
relevant sub-questions in json markdown that when composed can help answer the full user question:

# Example 1
<Tools>
```json
{
    \"uber_10k\": \"Provides information about Uber financials for year 2021\",
    \"lyft_10k\": \"Provides information about Lyft financials for year 2021\"
}
```

<User Question>
Compare and contrast the revenue growth and EBITDA of Uber and Lyft for year 2021

<Output>
```json
[
    {\"sub_question\": \"What is the revenue growth of Uber\", \"tool_name\": \"uber_10k\"},
    {\"sub_question\": \"What is the EBITDA of Uber\", \"tool_name\": \"uber_10k\"},
    {\"sub_question\": \"What is the revenue growth of Lyft\", \"tool_name\": \"lyft_10k\"},
    {\"sub_question\": \"What is the EBITDA of Lyft\", \"tool_name\": \"lyft_10k\"}
]
```

# Example 2
<Tools>
```json
{tools_str}
```

<User Question>
{query_str}

<Output>
";

/// 하위 질문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub sub_question: String,
    pub tool_name: String,
}

/// 분해 응답 파싱 (해석 실패 시 빈 목록)
pub fn parse_sub_questions(response: &str) -> Vec<SubQuestion> {
    extract_json(response, '[', ']')
        .and_then(|json| serde_json::from_str::<Vec<SubQuestion>>(json).ok())
        .unwrap_or_default()
}

/// 하위 질문 분해 에이전트
pub struct DecomposerAgent {
    llm: Arc<dyn LanguageModel>,
    tools: Vec<QueryEngineTool>,
    memory: ChatMemory,
    synthesizer: ResponseSynthesizer,
}

impl DecomposerAgent {
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

    fn tool(&self, name: &str) -> Option<&QueryEngineTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// 질문 분해
    ///
    /// 모르는 도구를 가리키는 하위 질문은 버리고, 남는 것이 없으면
    /// 원래 질문을 모든 도구에 묻습니다.
    async fn decompose(&self, query: &str) -> Result<Vec<SubQuestion>> {
        let tools: BTreeMap<&str, &str> = self
            .tools
            .iter()
            .map(|t| (t.name.as_str(), t.description.as_str()))
            .collect();
        let tools_str = serde_json::to_string_pretty(&tools)?;

        let prompt = format_prompt(
            DECOMPOSE_TEMPLATE,
            &[("tools_str", tools_str.as_str()), ("query_str", query)],
        );
        let response = self.llm.complete(&prompt).await?;

        let sub_questions: Vec<SubQuestion> = parse_sub_questions(&response)
            .into_iter()
            .filter(|sq| {
                let known = self.tool(&sq.tool_name).is_some();
                if !known {
                    tracing::warn!("Dropping sub question for unknown tool '{}'", sq.tool_name);
                }
                known
            })
            .collect();

        if sub_questions.is_empty() {
            tracing::warn!("No usable sub questions, asking every tool the original question");
            return Ok(self
                .tools
                .iter()
                .map(|t| SubQuestion {
                    sub_question: query.to_string(),
                    tool_name: t.name.clone(),
                })
                .collect());
        }

        Ok(sub_questions)
    }
}

#[async_trait]
impl Agent for DecomposerAgent {
    async fn answer(&mut self, query: &str) -> Result<AgentResponse> {
        let question = condense_question(self.llm.as_ref(), &self.memory, query).await?;
        let sub_questions = self.decompose(&question).await?;
        tracing::info!("Generated {} sub question(s)", sub_questions.len());

        let calls = sub_questions.iter().filter_map(|sq| {
            let tool = self.tool(&sq.tool_name)?;
            tracing::info!("[{}] Q: {}", tool.name, sq.sub_question);
            Some(tool.call(&sq.sub_question))
        });
        let results = try_join_all(calls).await?;

        let texts: Vec<String> = sub_questions
            .iter()
            .zip(&results)
            .map(|(sq, r)| format!("Sub question: {}\nResponse: {}", sq.sub_question, r.response))
            .collect();
        let answer = self.synthesizer.synthesize_texts(&question, &texts).await?;

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
        "sub_question"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_tools, KeywordingLlm, ScriptedLlm};
    use std::collections::HashSet;
    use tempfile::TempDir;

    const TWO_QUESTIONS: &str = "```json\n[\
        {\"sub_question\": \"How does Tokio schedule tasks?\", \"tool_name\": \"tokio_notes\"},\
        {\"sub_question\": \"How does SQLite store data?\", \"tool_name\": \"storage_notes\"}\
    ]\n```";

    #[test]
    fn test_parse_sub_questions() {
        let parsed = parse_sub_questions(TWO_QUESTIONS);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].tool_name, "storage_notes");

        assert!(parse_sub_questions("no idea").is_empty());
        assert!(parse_sub_questions("[{\"question\": \"missing fields\"}]").is_empty());
    }

    #[tokio::test]
    async fn test_sub_answers_are_synthesised() {
        let dir = TempDir::new().unwrap();
        let tools = sample_tools(&dir).await;
        let llm = Arc::new(ScriptedLlm::new(vec![TWO_QUESTIONS, "final answer"]));
        let mut agent = DecomposerAgent::new(llm.clone(), tools, ChatMemory::new(1500), 3900);

        let response = agent.answer("Compare Tokio and SQLite").await.unwrap();

        assert_eq!(response.response, "final answer");
        let names: HashSet<&str> = response.sources.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains("Tokio"));
        assert!(names.contains("SQLite"));

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("\"tokio_notes\": \"Notes about the Tokio async runtime\""));
        assert!(prompts[1].contains(&format!(
            "Sub question: How does Tokio schedule tasks?\nResponse: {}",
            KeywordingLlm::ANSWER
        )));
        assert_eq!(agent.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_dropped() {
        let dir = TempDir::new().unwrap();
        let tools = sample_tools(&dir).await;
        let llm = Arc::new(ScriptedLlm::new(vec![
            "[{\"sub_question\": \"What is Tokio?\", \"tool_name\": \"tokio_notes\"}, \
              {\"sub_question\": \"Latest news?\", \"tool_name\": \"internet_search\"}]",
            "final",
        ]));
        let mut agent = DecomposerAgent::new(llm.clone(), tools, ChatMemory::new(1500), 3900);

        let response = agent.answer("What is Tokio?").await.unwrap();

        assert!(response.sources.iter().all(|s| s.name != "SQLite"));
        assert!(!llm.prompts()[1].contains("Latest news?"));
    }

    #[tokio::test]
    async fn test_unparseable_decomposition_asks_every_tool() {
        let dir = TempDir::new().unwrap();
        let tools = sample_tools(&dir).await;
        let llm = Arc::new(ScriptedLlm::new(vec!["I cannot decompose this", "final"]));
        let mut agent = DecomposerAgent::new(llm.clone(), tools, ChatMemory::new(1500), 3900);

        let response = agent.answer("Tell me about storage").await.unwrap();

        assert_eq!(response.response, "final");
        let names: HashSet<&str> = response.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 4);
        assert_eq!(
            llm.prompts()[1].matches("Sub question: Tell me about storage").count(),
            2
        );
    }
}
