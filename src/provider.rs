//! OpenAI 호환 HTTP 트랜스포트
//!
//! 임베딩과 채팅 완성이 공유하는 요청 경로입니다.
//! - Rate Limiter: 분당 요청 수 + 호출 간 최소 간격
//! - 429 / 5xx / 네트워크 에러: 지수 백오프로 재시도
//! - 401 / 403: 재시도 없이 인증 에러
//!
//! ref: https://platform.openai.com/docs/guides/error-codes

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{RagError, Result};

/// 프로바이더 이름 (에러 메시지용)
pub const PROVIDER_NAME: &str = "openai";

/// Rate Limiter 설정
const RATE_LIMIT_RPM: u32 = 500;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 20;
/// 재시도 가능한 에러의 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 1000;
/// 요청 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// Rate Limiter
// ============================================================================

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능해질 때까지 대기
    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

// ============================================================================
// Failure Classification
// ============================================================================

/// 실패 응답 처리 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    /// 인증 실패 - 즉시 중단
    Authentication,
    /// 일시적 실패 - 백오프 후 재시도
    Retryable,
    /// 그 외 - 즉시 중단
    Fatal,
}

/// HTTP 상태 코드 분류
pub(crate) fn classify_status(status: u16) -> Failure {
    match status {
        401 | 403 => Failure::Authentication,
        408 | 409 | 429 => Failure::Retryable,
        500..=599 => Failure::Retryable,
        _ => Failure::Fatal,
    }
}

/// OpenAI 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// 에러 본문에서 메시지 추출 (파싱 실패 시 원문)
pub(crate) fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) => format!("{} ({})", err.error.message, status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

// ============================================================================
// Transport
// ============================================================================

/// OpenAI 호환 API 트랜스포트
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    api_key: String,
    api_base: String,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl OpenAiTransport {
    /// 새 트랜스포트 생성
    ///
    /// # Arguments
    /// * `api_key` - API 키 (비어 있으면 인증 에러)
    /// * `api_base` - API 베이스 URL (예: `https://api.openai.com/v1`)
    pub fn new(api_key: String, api_base: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::authentication(
                PROVIDER_NAME,
                "API key is missing. Set OPENAI_API_KEY.",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RagError::provider(PROVIDER_NAME, format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    /// 엔드포인트 URL
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// JSON POST (재시도 포함)
    pub async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.url(path);
        let mut last_error: Option<RagError> = None;

        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(RagError::provider(
                        PROVIDER_NAME,
                        format!("Failed to send request to {}: {}", path, e),
                    ));
                    if attempt < MAX_RETRIES {
                        let wait = backoff(attempt);
                        tracing::warn!(
                            "Request to {} failed, retrying in {:?} (attempt {}/{})",
                            path,
                            wait,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                RagError::provider(PROVIDER_NAME, format!("Failed to read response body: {}", e))
            })?;

            if (200..300).contains(&status) {
                return serde_json::from_str(&body).map_err(|e| {
                    RagError::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
                });
            }

            let message = error_message(status, &body);
            match classify_status(status) {
                Failure::Authentication => {
                    return Err(RagError::authentication(PROVIDER_NAME, message));
                }
                Failure::Fatal => {
                    return Err(RagError::provider(PROVIDER_NAME, message));
                }
                Failure::Retryable => {
                    last_error = Some(RagError::provider(PROVIDER_NAME, message));
                    if attempt < MAX_RETRIES {
                        let wait = backoff(attempt);
                        tracing::warn!(
                            "{} returned {}, backing off {:?} (attempt {}/{})",
                            path,
                            status,
                            wait,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RagError::provider(
                PROVIDER_NAME,
                format!("Request failed after {} retries", MAX_RETRIES),
            )
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(401), Failure::Authentication);
        assert_eq!(classify_status(403), Failure::Authentication);
        assert_eq!(classify_status(429), Failure::Retryable);
        assert_eq!(classify_status(503), Failure::Retryable);
        assert_eq!(classify_status(400), Failure::Fatal);
        assert_eq!(classify_status(404), Failure::Fatal);
    }

    #[test]
    fn test_error_message_parses_openai_body() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            error_message(401, body),
            "Incorrect API key provided (401)"
        );
        assert_eq!(error_message(502, "bad gateway"), "HTTP 502: bad gateway");
    }

    #[test]
    fn test_empty_api_key_is_authentication_error() {
        let result = OpenAiTransport::new("  ".to_string(), "https://api.openai.com/v1");
        assert!(matches!(result, Err(ref e) if e.is_authentication()));
    }

    #[test]
    fn test_url_join() {
        let transport =
            OpenAiTransport::new("sk-test".to_string(), "https://api.openai.com/v1/").unwrap();
        assert_eq!(
            transport.url("/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            transport.url("chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(0), Duration::from_millis(1000));
        assert_eq!(backoff(2), Duration::from_millis(4000));
    }
}
