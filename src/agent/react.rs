//! ReAct 에이전트
//!
//! 언어 모델이 `Thought / Action / Action Input` 형식으로 도구 호출을 요청하면
//! 도구 결과를 `Observation`으로 돌려주고, `Answer`가 나올 때까지 반복합니다.
//!
//! ref: https://arxiv.org/abs/2210.03629

use std::sync::Arc;

use async_trait::async_trait;

use super::{describe_tools, extract_json, Agent, AgentResponse, ChatMemory, QueryEngineTool};
use crate::error::{RagError, Result};
use crate::llm::{format_prompt, ChatMessage, LanguageModel};

const REACT_HEADER: &str = "You are designed to help with a variety of tasks, from answering \
questions to providing summaries to other types of analyses.

## Tools
You have access to a wide variety of tools. You are responsible for using the tools in any \
sequence you deem appropriate to complete the task at hand. This may require breaking the task \
into subtasks and using different tools to complete each subtask.

You have access to the following tools:
{tool_desc}

## Output Format
To answer the question, please use the following format.

```
Thought: I need to use a tool to help me answer the question.
Action: tool name (one of {tool_names}) if using a tool.
Action Input: the input to the tool, in a JSON format representing the kwargs (e.g. {\"input\": \"hello world\"})
```

Please ALWAYS start with a Thought.

If this format is used, the user will respond in the following format:

```
Observation: tool response
```

You should keep repeating the above format until you have enough information to answer the \
question without using any more tools. At that point, you MUST respond in the following format:

```
Thought: I can answer without using any more tools.
Answer: [your answer here]
```

## Current Conversation
Below is the current conversation consisting of interleaving human and assistant messages.";

/// 모델 출력 한 단계
#[derive(Debug, Clone, PartialEq)]
pub enum ReactStep {
    Action {
        thought: String,
        tool: String,
        input: String,
    },
    Answer {
        thought: String,
        answer: String,
    },
}

fn thought_before(output: &str, end: usize) -> String {
    let head = &output[..end];
    match head.find("Thought:") {
        Some(start) => head[start + "Thought:".len()..].trim().to_string(),
        None => head.trim().to_string(),
    }
}

/// `Action Input` 값 해석
///
/// `{"input": "..."}` 형식이면 값을 꺼내고, 아니면 원문을 그대로 씁니다.
fn parse_action_input(raw: &str) -> String {
    let raw = raw.trim();

    if let Some(json) = extract_json(raw, '{', '}') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(json) {
            let value = map
                .get("input")
                .or_else(|| map.values().find(|v| v.is_string()));
            if let Some(serde_json::Value::String(input)) = value {
                return input.clone();
            }
        }
    }

    raw.trim_matches(|c| c == '"' || c == '`').trim().to_string()
}

/// 모델 출력 파싱
///
/// `Thought:` 없이 온 출력은 바로 답변으로 취급합니다.
pub fn parse_react_output(output: &str) -> Result<ReactStep> {
    let action_pos = output.find("Action:");
    let answer_pos = output.find("Answer:");

    if let Some(action) = action_pos.filter(|&a| answer_pos.map_or(true, |b| a < b)) {
        let rest = &output[action + "Action:".len()..];
        let input_pos = rest
            .find("Action Input:")
            .ok_or_else(|| RagError::Agent("Missing 'Action Input:' after 'Action:'".to_string()))?;

        let mut raw_input = &rest[input_pos + "Action Input:".len()..];
        if let Some(cut) = raw_input.find("Observation:") {
            raw_input = &raw_input[..cut];
        }

        return Ok(ReactStep::Action {
            thought: thought_before(output, action),
            tool: rest[..input_pos].trim().to_string(),
            input: parse_action_input(raw_input),
        });
    }

    if let Some(answer) = answer_pos {
        return Ok(ReactStep::Answer {
            thought: thought_before(output, answer),
            answer: output[answer + "Answer:".len()..].trim().to_string(),
        });
    }

    if !output.contains("Thought:") {
        return Ok(ReactStep::Answer {
            thought: "(Implicit) I can answer without any more tools!".to_string(),
            answer: output.trim().to_string(),
        });
    }

    Err(RagError::Agent(format!(
        "Could not parse output: {}",
        output.trim()
    )))
}

/// ReAct 에이전트
pub struct ReactiveAgent {
    llm: Arc<dyn LanguageModel>,
    tools: Vec<QueryEngineTool>,
    memory: ChatMemory,
    max_iterations: usize,
    context: Option<String>,
}

impl ReactiveAgent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        tools: Vec<QueryEngineTool>,
        memory: ChatMemory,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            memory,
            max_iterations: max_iterations.max(1),
            context: None,
        }
    }

    /// 도구 안내 앞에 붙일 지시문 (시스템 프롬프트)
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    fn header(&self) -> String {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        let header = format_prompt(
            REACT_HEADER,
            &[
                ("tool_desc", describe_tools(&self.tools).as_str()),
                ("tool_names", names.join(", ").as_str()),
            ],
        );

        match &self.context {
            Some(context) => format!("{}\n\n{}", context, header),
            None => header,
        }
    }

    /// 도구 실행 결과 (Observation 본문)
    async fn observe(&self, tool: &str, input: &str, response: &mut AgentResponse) -> Result<String> {
        match self.tools.iter().find(|t| t.name == tool) {
            Some(t) => {
                let result = t.call(input).await?;
                response.sources.extend(result.source_nodes);
                Ok(result.response)
            }
            None => {
                tracing::warn!("Agent requested unknown tool '{}'", tool);
                let names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
                Ok(format!(
                    "Error: no tool named '{}'. Available tools: {}",
                    tool,
                    names.join(", ")
                ))
            }
        }
    }
}

#[async_trait]
impl Agent for ReactiveAgent {
    async fn answer(&mut self, query: &str) -> Result<AgentResponse> {
        let mut messages = vec![ChatMessage::system(self.header())];
        messages.extend(self.memory.get());
        messages.push(ChatMessage::user(query));

        let mut response = AgentResponse::default();

        for step in 1..=self.max_iterations {
            let output = self.llm.chat(&messages).await?;

            let observation = match parse_react_output(&output) {
                Ok(ReactStep::Answer { answer, .. }) => {
                    tracing::debug!("ReAct finished after {} step(s)", step);
                    self.memory.put_turn(query, &answer);
                    response.response = answer;
                    return Ok(response);
                }
                Ok(ReactStep::Action { thought, tool, input }) => {
                    tracing::debug!("ReAct step {}: {}", step, thought);
                    self.observe(&tool, &input, &mut response).await?
                }
                Err(e) => {
                    tracing::warn!("ReAct step {}: {}", step, e);
                    e.to_string()
                }
            };

            messages.push(ChatMessage::assistant(output.trim()));
            messages.push(ChatMessage::user(format!("Observation: {}", observation)));
        }

        Err(RagError::Agent(format!(
            "Reached max iterations ({})",
            self.max_iterations
        )))
    }

    fn reset(&mut self) {
        self.memory.reset();
    }

    fn name(&self) -> &'static str {
        "react"
    }
}
