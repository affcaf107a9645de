//! 에이전트 모듈 - 컬렉션 질의 엔진을 도구로 쓰는 대화 계층
//!
//! 모드는 설정값(`AgentMode`)으로 고르고, 모든 전략은 같은 `Agent` 트레이트를 구현합니다.
//! - `ReactiveAgent`: Thought / Action / Observation 루프
//! - `RouterAgent`: 설명을 보고 도구를 골라 질의
//! - `DecomposerAgent`: 하위 질문으로 나눠서 질의한 뒤 종합

mod memory;
mod react;
mod router;
mod sub_question;

pub use memory::ChatMemory;
pub use react::{parse_react_output, ReactStep, ReactiveAgent};
pub use router::RouterAgent;
pub use sub_question::{DecomposerAgent, SubQuestion};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AgentConfig, AgentMode};
use crate::error::{RagError, Result};
use crate::knowledge::CollectionStore;
use crate::llm::{format_prompt, LanguageModel};
use crate::models::UserModels;
use crate::retrieval::{HybridQueryEngine, QueryResponse, SourceNode};

/// 참고 문서 이름 최대 길이 (문자 수)
pub const MAX_REFERENCE_NAME_CHARS: usize = 80;

const REFERENCES_HEADER: &str =
    "Some helpful articles, sorted by relevance according to LLM Judge, along with semantic scores:";

// ============================================================================
// Tools
// ============================================================================

/// 컬렉션 질의 엔진 도구
#[derive(Clone)]
pub struct QueryEngineTool {
    pub name: String,
    pub description: String,
    pub engine: Arc<HybridQueryEngine>,
}

impl QueryEngineTool {
    pub fn new(engine: HybridQueryEngine) -> Self {
        Self {
            name: engine.name().to_string(),
            description: engine.description().to_string(),
            engine: Arc::new(engine),
        }
    }

    /// 도구 호출
    pub async fn call(&self, input: &str) -> Result<QueryResponse> {
        tracing::info!("Calling tool '{}' with input: {}", self.name, input);
        self.engine.query(input).await
    }
}

impl std::fmt::Debug for QueryEngineTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngineTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// 이름 목록의 컬렉션을 도구로 로드
///
/// 카탈로그에 없는 컬렉션은 경고 후 건너뜁니다.
pub async fn load_tools(
    store: &CollectionStore,
    names: &[String],
    models: &UserModels,
) -> Result<Vec<QueryEngineTool>> {
    let mut tools = Vec::with_capacity(names.len());

    for name in names {
        match HybridQueryEngine::open(store, name, models).await? {
            Some(engine) => {
                tracing::info!("Query engine '{}' was loaded", name);
                tools.push(QueryEngineTool::new(engine));
            }
            None => tracing::warn!("Query engine '{}' could not be loaded", name),
        }
    }

    Ok(tools)
}

// ============================================================================
// Agent Trait
// ============================================================================

/// 에이전트 응답
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub response: String,
    /// 이번 답변에 사용된 도구 출처 전부 (중복 포함)
    pub sources: Vec<SourceNode>,
}

impl AgentResponse {
    /// 답변 + 참고 문서 목록
    pub fn render(&self) -> String {
        match format_references(&aggregate_references(&self.sources)) {
            Some(references) => format!("{}\n\n{}", self.response, references),
            None => self.response.clone(),
        }
    }
}

/// 대화형 에이전트
#[async_trait]
pub trait Agent: Send {
    /// 질문에 답하고 대화 기록에 남김
    async fn answer(&mut self, query: &str) -> Result<AgentResponse>;

    /// 대화 기록 초기화
    fn reset(&mut self);

    /// 전략 이름
    fn name(&self) -> &'static str;
}

/// 설정된 모드의 에이전트 생성
pub fn build_agent(
    config: &AgentConfig,
    llm: Arc<dyn LanguageModel>,
    tools: Vec<QueryEngineTool>,
    context_window_tokens: usize,
) -> Result<Box<dyn Agent>> {
    if tools.is_empty() {
        return Err(RagError::Agent("No query engine tools were loaded".to_string()));
    }

    let memory = ChatMemory::new(config.memory_token_limit);
    tracing::info!(
        "Building {:?} agent with {} tool(s)",
        config.mode,
        tools.len()
    );

    let agent: Box<dyn Agent> = match config.mode {
        AgentMode::React => {
            let agent = ReactiveAgent::new(llm, tools, memory, config.max_iterations);
            Box::new(match config.system_prompt() {
                Some(prompt) => agent.with_context(prompt),
                None => agent,
            })
        }
        AgentMode::Router => Box::new(RouterAgent::new(llm, tools, memory, context_window_tokens)),
        AgentMode::SubQuestion => {
            Box::new(DecomposerAgent::new(llm, tools, memory, context_window_tokens))
        }
    };

    Ok(agent)
}

/// 한 턴 실행 후 사용자에게 보여줄 메시지 생성
///
/// 실패해도 에러 대신 안내 메시지를 돌려줍니다.
pub async fn respond(agent: &mut dyn Agent, query: &str) -> String {
    match agent.answer(query).await {
        Ok(response) => response.render(),
        Err(e) => {
            if e.is_authentication() {
                tracing::error!("Authentication error: {}", e);
            } else {
                tracing::error!("An unexpected error occurred: {}", e);
            }
            error_message(&e)
        }
    }
}

/// 사용자용 에러 메시지
pub fn error_message(error: &RagError) -> String {
    if error.is_authentication() {
        "An error occurred: Authentication Error. Please check your OpenAI API key.".to_string()
    } else {
        format!("An error occurred: {}", error)
    }
}

// ============================================================================
// References
// ============================================================================

/// 참고 문서
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub link: String,
    pub score: f32,
}

/// 출처를 (이름, 링크) 기준으로 합침
///
/// 스코어는 관측된 최댓값(없으면 0)이고, 결과는 스코어 내림차순입니다.
pub fn aggregate_references(sources: &[SourceNode]) -> Vec<Reference> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut references: Vec<Reference> = Vec::new();

    for source in sources {
        if source.name.is_empty() || source.link.is_empty() {
            continue;
        }

        let name = if source.name.chars().count() > MAX_REFERENCE_NAME_CHARS {
            let truncated: String = source.name.chars().take(MAX_REFERENCE_NAME_CHARS).collect();
            format!("{}...", truncated)
        } else {
            source.name.clone()
        };
        let score = source.score.unwrap_or(0.0);
        let key = (name.clone(), source.link.clone());

        match index.get(&key) {
            Some(&i) => references[i].score = references[i].score.max(score),
            None => {
                index.insert(key, references.len());
                references.push(Reference {
                    name,
                    link: source.link.clone(),
                    score,
                });
            }
        }
    }

    references.sort_by(|a, b| b.score.total_cmp(&a.score));
    references
}

/// 참고 문서 목록 출력 형식 (없으면 `None`)
pub fn format_references(references: &[Reference]) -> Option<String> {
    if references.is_empty() {
        return None;
    }

    let items: Vec<String> = references
        .iter()
        .map(|r| {
            if r.score != 0.0 {
                format!("🔗 [{}]({}) ⭐ {:.2}/1  | ", r.name, r.link, r.score)
            } else {
                format!("🔗 [{}]({}) ⭐ -/1  | ", r.name, r.link)
            }
        })
        .collect();

    Some(format!("{}\n{}", REFERENCES_HEADER, items.join(" ")))
}

// ============================================================================
// Prompt Helpers
// ============================================================================

const CONDENSE_QUESTION_TEMPLATE: &str = "Given a conversation (between Human and Assistant) and a \
follow up message from Human, rewrite the message to be a standalone question that captures all \
relevant context from the conversation.

<Chat History>
{chat_history}

<Follow Up Message>
{question}

<Standalone question>
";

/// 이전 대화를 반영한 독립 질문
///
/// 기록이 없으면 모델을 부르지 않고 질문을 그대로 돌려줍니다.
pub(crate) async fn condense_question(
    llm: &dyn LanguageModel,
    memory: &ChatMemory,
    query: &str,
) -> Result<String> {
    if memory.get().is_empty() {
        return Ok(query.to_string());
    }

    let prompt = format_prompt(
        CONDENSE_QUESTION_TEMPLATE,
        &[("chat_history", memory.transcript().as_str()), ("question", query)],
    );
    let condensed = llm.complete(&prompt).await?;
    let condensed = condensed.trim();

    tracing::debug!("Condensed question: {}", condensed);
    Ok(if condensed.is_empty() {
        query.to_string()
    } else {
        condensed.to_string()
    })
}

/// 응답에서 JSON 부분만 잘라냄 (코드 펜스나 앞뒤 설명 제거)
pub(crate) fn extract_json(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

/// 도구 목록 설명
pub(crate) fn describe_tools(tools: &[QueryEngineTool]) -> String {
    tools
        .iter()
        .map(|t| format!("> Tool Name: {}\nTool Description: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Tests
// ============================================================================
