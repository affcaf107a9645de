//! 언어 모델 모듈 - 채팅 완성
//!
//! 키워드 추출(인덱스 구축 시), 리랭킹, 응답 합성, 에이전트가 사용합니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::provider::{OpenAiTransport, PROVIDER_NAME};

// ============================================================================
// Messages
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 채팅 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Prompt Templates
// ============================================================================

/// 프롬프트 템플릿의 `{name}` 자리를 한 번에 채움
///
/// 채운 값은 다시 검사하지 않으므로 값 안의 `{...}`는 그대로 남습니다.
/// 목록에 없는 이름의 중괄호(JSON 예시 등)도 건드리지 않습니다.
pub fn format_prompt(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let filled = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });

        match filled {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 메시지 목록으로 응답 생성
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// 단일 프롬프트 완성
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Chat
// ============================================================================

/// OpenAI 채팅 완성 구현체
///
/// ref: https://platform.openai.com/docs/api-reference/chat
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    transport: OpenAiTransport,
    display_name: String,
    model: String,
    temperature: f32,
    system_prompt: Option<String>,
}

impl OpenAiChat {
    pub fn new(
        transport: OpenAiTransport,
        display_name: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            transport,
            display_name: display_name.into(),
            model: model.into(),
            temperature,
            system_prompt: None,
        }
    }

    /// 기본 시스템 프롬프트 지정
    ///
    /// 첫 메시지가 시스템 메시지가 아닌 호출에만 앞에 붙습니다.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// 채팅 요청 본문
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

/// 채팅 응답
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 시스템 프롬프트를 붙인 와이어 메시지 목록
fn wire_messages<'a>(
    system_prompt: Option<&'a str>,
    messages: &'a [ChatMessage],
) -> Vec<WireMessage<'a>> {
    let mut wire = Vec::with_capacity(messages.len() + 1);

    let has_system = messages
        .first()
        .map(|m| m.role == Role::System)
        .unwrap_or(false);

    if let (Some(prompt), false) = (system_prompt, has_system) {
        wire.push(WireMessage {
            role: Role::System,
            content: prompt,
        });
    }

    wire.extend(messages.iter().map(|m| WireMessage {
        role: m.role,
        content: &m.content,
    }));

    wire
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages(self.system_prompt.as_deref(), messages),
            temperature: self.temperature,
        };

        let response: ChatResponse = self
            .transport
            .post_json("chat/completions", &request)
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::provider(PROVIDER_NAME, "Empty chat completion"))
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

// ============================================================================
// Tests
// ============================================================================
