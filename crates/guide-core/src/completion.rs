use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CommonError;

#[derive(Clone)]
pub struct CompletionClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl CompletionClientConfig {
    /// Required:
    /// - `PERPLEXITY_API_KEY`
    ///
    /// Optional:
    /// - `MODEL_NAME` (default: "sonar")
    /// - `PERPLEXITY_BASE_URL` (default: "https://api.perplexity.ai")
    /// - `COMPLETION_TIMEOUT_SECS` (default: 30)
    /// - `COMPLETION_MAX_RETRIES` (default: 0)
    /// - `COMPLETION_RETRY_INITIAL_MS`, `COMPLETION_RETRY_MAX_MS`
    /// - `COMPLETION_MAX_ERROR_BODY_BYTES` (default: 8 KiB)
    pub fn from_env() -> Result<Self, CommonError> {
        let api_key = std::env::var("PERPLEXITY_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != "YOUR_API_KEY_HERE")
            .ok_or_else(|| {
                CommonError::Config("PERPLEXITY_API_KEY environment variable is required".to_string())
            })?;

        let base_url = std::env::var("PERPLEXITY_BASE_URL")
            .unwrap_or_else(|_| "https://api.perplexity.ai".to_string());

        let model = std::env::var("MODEL_NAME")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "sonar".to_string());

        let default_timeout = std::env::var("COMPLETION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        let max_retries = std::env::var("COMPLETION_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);

        let initial_backoff = std::env::var("COMPLETION_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var("COMPLETION_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = std::env::var("COMPLETION_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Ok(Self::new(api_key, base_url, model)
            .with_timeout(default_timeout)
            .with_retries(max_retries, initial_backoff, max_backoff)
            .with_max_error_body_bytes(max_error_body_bytes))
    }

    /// Single-shot configuration: 30s timeout, no retries.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            max_retries: 0,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5_000),
            max_error_body_bytes: 8 * 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial: Duration, max: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_max_error_body_bytes(mut self, bytes: usize) -> Self {
        self.max_error_body_bytes = bytes;
        self
    }
}

// The API key stays out of logs.
impl std::fmt::Debug for CompletionClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClientConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("default_timeout", &self.default_timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("empty response from model")]
    EmptyCompletion,
}

/// Chat-completions client for OpenAI-compatible text generation APIs.
#[derive(Clone)]
pub struct CompletionClient {
    config: CompletionClientConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionClientConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .user_agent("wow-collection-helper")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        timeout_override: Option<Duration>,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let timeout = timeout_override.unwrap_or(self.config.default_timeout);
        self.request_with_retry(|| {
            let req = request.clone();
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.config.api_key)
                    .timeout(timeout)
                    .json(&req)
                    .send()
                    .await?;
                Self::parse_json_response(resp, self.config.max_error_body_bytes).await
            }
        })
        .await
    }

    /// Send a single user prompt and return the first non-empty completion text.
    pub async fn complete(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            max_tokens: Some(params.max_tokens),
            return_citations: Some(false),
        };
        let response = self.chat_completions(request, None).await?;
        debug!(
            model = %self.config.model,
            total_tokens = response.usage.as_ref().and_then(|u| u.total_tokens),
            "completion received"
        );
        response.first_text().ok_or(CompletionError::EmptyCompletion)
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, CompletionError> {
        if resp.status().is_success() {
            let json = resp.json::<T>().await?;
            return Ok(json);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> CompletionError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(&body) {
            if let Some(message) = parsed.error.message() {
                return CompletionError::Upstream { status, message };
            }
        }
        CompletionError::UpstreamBody { status, body }
    }

    // Runs `attempt` once, then up to `max_retries` more times while the
    // failure is transient.
    async fn request_with_retry<T, Fut, F>(&self, mut attempt: F) -> Result<T, CompletionError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CompletionError>>,
    {
        let mut retries_used: u32 = 0;
        loop {
            let err = match attempt().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            if retries_used >= self.config.max_retries || !err.is_transient() {
                return Err(err);
            }
            let delay = self.config.retry_delay(retries_used);
            retries_used += 1;
            warn!(
                retry = retries_used,
                of = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "guide completion attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Sampling parameters sent with every guide request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Upstream statuses that get another attempt. Any other 4xx/5xx is final.
const TRANSIENT_STATUSES: [StatusCode; 4] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

impl CompletionError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Request(e) => e.is_timeout() || e.is_connect(),
            CompletionError::Upstream { status, .. } | CompletionError::UpstreamBody { status, .. } => {
                TRANSIENT_STATUSES.contains(status)
            }
            CompletionError::EmptyCompletion => false,
        }
    }
}

impl CompletionClientConfig {
    // Doubles from `initial_backoff` per retry, capped at `max_backoff`, plus
    // up to a quarter of that as clock-derived jitter.
    fn retry_delay(&self, retries_used: u32) -> Duration {
        let factor = 2u32.saturating_pow(retries_used);
        let base = self
            .initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff);
        let spread_ms = (base.as_millis() as u64 / 4).max(1);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0);
        base + Duration::from_millis(nanos % (spread_ms + 1))
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

// Providers send either `{"error": {"message": ...}}` or `{"error": "..."}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: Option<String> },
    Text(String),
}

impl ErrorDetail {
    fn message(self) -> Option<String> {
        match self {
            ErrorDetail::Object { message } => message,
            ErrorDetail::Text(text) => Some(text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_citations: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if it is non-blank.
    pub fn first_text(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const PARAMS: GenerationParams = GenerationParams {
        temperature: 0.3,
        top_p: 0.9,
        max_tokens: 1024,
    };

    fn client(url: String) -> CompletionClient {
        CompletionClient::new(CompletionClientConfig::new("test-key", url, "sonar")).unwrap()
    }

    #[tokio::test]
    async fn complete_sends_prompt_and_params() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "sonar",
                "messages": [{"role": "user", "content": "how do I get it?"}],
                "temperature": 0.3,
                "max_tokens": 1024,
                "return_citations": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"1. Kill boss"}}]}"#)
            .create_async()
            .await;

        let text = client(server.url()).complete("how do I get it?", PARAMS).await.unwrap();
        assert_eq!(text, "1. Kill boss");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"   "}}]}"#)
            .create_async()
            .await;

        let err = client(server.url()).complete("p", PARAMS).await.unwrap_err();
        assert!(matches!(err, CompletionError::EmptyCompletion));
    }

    #[tokio::test]
    async fn missing_choices_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"x"}"#)
            .create_async()
            .await;

        let err = client(server.url()).complete("p", PARAMS).await.unwrap_err();
        assert!(matches!(err, CompletionError::EmptyCompletion));
    }

    #[tokio::test]
    async fn upstream_error_message_is_parsed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"Invalid API key","type":"auth"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client(server.url()).complete("p", PARAMS).await.unwrap_err();
        match err {
            CompletionError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_not_retried_by_default() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("service unavailable")
            .expect(1)
            .create_async()
            .await;

        let err = client(server.url()).complete("p", PARAMS).await.unwrap_err();
        assert!(matches!(err, CompletionError::UpstreamBody { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn configured_retries_repeat_gateway_errors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("boom")
            .expect(3)
            .create_async()
            .await;

        let config = CompletionClientConfig::new("k", server.url(), "sonar").with_retries(
            2,
            Duration::from_millis(1),
            Duration::from_millis(2),
        );
        let err = CompletionClient::new(config)
            .unwrap()
            .complete("p", PARAMS)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::UpstreamBody { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_faults_are_not_retried() {
        for status in [400, 500] {
            let mut server = Server::new_async().await;
            let mock = server
                .mock("POST", "/chat/completions")
                .with_status(status)
                .with_body(r#"{"error":{"message":"bad request"}}"#)
                .expect(1)
                .create_async()
                .await;

            let config = CompletionClientConfig::new("k", server.url(), "sonar").with_retries(
                3,
                Duration::from_millis(1),
                Duration::from_millis(2),
            );
            let err = CompletionClient::new(config)
                .unwrap()
                .complete("p", PARAMS)
                .await
                .unwrap_err();
            assert!(!err.is_transient(), "{status}");
            mock.assert_async().await;
        }
    }

    #[test]
    fn only_rate_limits_and_gateway_failures_are_transient() {
        let upstream = |code: u16| CompletionError::UpstreamBody {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        for code in [429, 502, 503, 504] {
            assert!(upstream(code).is_transient(), "{code}");
        }
        for code in [400, 401, 404, 500] {
            assert!(!upstream(code).is_transient(), "{code}");
        }
        assert!(!CompletionError::EmptyCompletion.is_transient());
    }

    #[test]
    fn retry_delay_doubles_up_to_the_cap() {
        let config = CompletionClientConfig::new("k", "http://localhost", "sonar").with_retries(
            5,
            Duration::from_millis(100),
            Duration::from_millis(300),
        );
        let first = config.retry_delay(0);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        let second = config.retry_delay(1);
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(250));
        let capped = config.retry_delay(10);
        assert!(capped >= Duration::from_millis(300) && capped <= Duration::from_millis(375));
    }

    // Every environment-mutating case lives in this one test so they never race.
    #[test]
    fn from_env_requires_a_real_api_key() {
        std::env::remove_var("PERPLEXITY_API_KEY");
        assert!(matches!(
            CompletionClientConfig::from_env(),
            Err(CommonError::Config(_))
        ));

        for placeholder in ["", "   ", "YOUR_API_KEY_HERE"] {
            std::env::set_var("PERPLEXITY_API_KEY", placeholder);
            assert!(
                matches!(CompletionClientConfig::from_env(), Err(CommonError::Config(_))),
                "{placeholder:?} should be rejected"
            );
        }

        std::env::set_var("PERPLEXITY_API_KEY", " pplx-test ");
        std::env::set_var("MODEL_NAME", "sonar-pro");
        std::env::set_var("COMPLETION_TIMEOUT_SECS", "0");
        let config = CompletionClientConfig::from_env().unwrap();
        assert_eq!(config.api_key, "pplx-test");
        assert_eq!(config.model, "sonar-pro");
        assert_eq!(config.default_timeout, Duration::from_secs(30));

        std::env::remove_var("PERPLEXITY_API_KEY");
        std::env::remove_var("MODEL_NAME");
        std::env::remove_var("COMPLETION_TIMEOUT_SECS");
    }

    #[test]
    fn debug_hides_api_key() {
        let config = CompletionClientConfig::new("secret-key", "http://x/", "sonar");
        assert_eq!(config.base_url, "http://x");
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
