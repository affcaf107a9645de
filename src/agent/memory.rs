//! 대화 기록 버퍼

use crate::llm::{ChatMessage, Role};

/// 토큰 제한이 있는 대화 기록
///
/// 전체 기록은 보관하고, 꺼낼 때 최근 메시지부터 제한 안에 들어가는 만큼만 돌려줍니다.
/// 토큰 수는 공백 단위 단어 수입니다.
#[derive(Debug, Clone, Default)]
pub struct ChatMemory {
    messages: Vec<ChatMessage>,
    token_limit: usize,
}

fn message_tokens(message: &ChatMessage) -> usize {
    message.content.split_whitespace().count()
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            token_limit,
        }
    }

    pub fn put(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// 사용자 질문과 답변 한 쌍 기록
    pub fn put_turn(&mut self, query: &str, answer: &str) {
        self.put(ChatMessage::user(query));
        self.put(ChatMessage::assistant(answer));
    }

    /// 제한 안에 들어가는 최근 메시지
    ///
    /// 잘린 기록이 어시스턴트 메시지로 시작하지 않도록 앞쪽을 더 버립니다.
    pub fn get(&self) -> Vec<ChatMessage> {
        let mut total = 0;
        let mut start = self.messages.len();

        for (i, message) in self.messages.iter().enumerate().rev() {
            total += message_tokens(message);
            if total > self.token_limit {
                break;
            }
            start = i;
        }

        while start < self.messages.len() && self.messages[start].role == Role::Assistant {
            start += 1;
        }

        self.messages[start..].to_vec()
    }

    /// 최근 기록을 `role: content` 줄로
    pub fn transcript(&self) -> String {
        self.get()
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_recent_messages_within_limit() {
        let mut memory = ChatMemory::new(5);
        memory.put_turn("one two", "three four");
        memory.put_turn("five six", "seven");

        let recent = memory.get();
        // "three four"까지 5 토큰이지만 어시스턴트 메시지라 버려짐
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "five six");
        assert_eq!(memory.len(), 4);
    }

    #[test]
    fn test_does_not_start_with_assistant() {
        let mut memory = ChatMemory::new(3);
        memory.put_turn("a long user question here", "short");
        memory.put_turn("next", "ok");

        let recent = memory.get();
        // "short"가 들어갈 자리는 있지만 어시스턴트로 시작하므로 버림
        assert_eq!(recent[0].role, Role::User);
        assert_eq!(recent[0].content, "next");
    }

    #[test]
    fn test_reset_and_transcript() {
        let mut memory = ChatMemory::new(1500);
        memory.put_turn("What is Tokio?", "An async runtime.");
        assert_eq!(
            memory.transcript(),
            "user: What is Tokio?\nassistant: An async runtime."
        );

        memory.reset();
        assert!(memory.is_empty());
        assert!(memory.get().is_empty());
        assert_eq!(memory.transcript(), "");
    }
}
