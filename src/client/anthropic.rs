use std::time::Duration;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use crate::config::ApiSettings;
use crate::error::{EndpointError, FailureReason, Result};
use super::{CompletionRequest, GenerationEndpoint};

/// Value sent in the `anthropic-version` header
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    message: String,
}

/// Anthropic Messages API over `reqwest`
pub struct AnthropicEndpoint {
    client: Client,
    api_key: String,
    messages_url: String,
}

impl AnthropicEndpoint {
    /// Creates an endpoint for `api_key` with the timeout and base URL of `api`
    pub fn new(api_key: impl Into<String>, api: &ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(api.timeout())
            .user_agent(concat!("autodocgen/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            messages_url: format!("{}/v1/messages", api.base_url.trim_end_matches('/')),
        })
    }

    fn error_for_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> EndpointError {
        let detail = serde_json::from_str::<ApiError>(body).ok().map(|e| e.error);
        let message = match &detail {
            Some(d) => format!("API error ({}): {}", status.as_u16(), d.message),
            None => format!("API error ({}): {}", status.as_u16(), body.trim()),
        };
        let error_type = detail.as_ref().map(|d| d.error_type.as_str()).unwrap_or("");

        match status {
            StatusCode::TOO_MANY_REQUESTS => EndpointError::rate_limited(message, retry_after),
            _ if error_type == "rate_limit_error" => EndpointError::rate_limited(message, retry_after),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                EndpointError::new(FailureReason::AuthenticationError, message)
            }
            _ => EndpointError::new(FailureReason::InvalidResponse, message),
        }
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[async_trait]
impl GenerationEndpoint for AnthropicEndpoint {
    async fn complete(&self, request: CompletionRequest) -> std::result::Result<String, EndpointError> {
        let body = ApiRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!("POST {} (model {}, max_tokens {})", self.messages_url, request.model, request.max_tokens);
        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            let error = Self::error_for_status(status, retry_after, &text);
            warn!("Messages API call failed: {}", error);
            return Err(error);
        }

        let text = response.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&text).map_err(|e| {
            EndpointError::new(
                FailureReason::InvalidResponse,
                format!("Failed to parse response: {}", e),
            )
        })?;

        let documentation = parsed
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if documentation.trim().is_empty() {
            return Err(EndpointError::new(
                FailureReason::InvalidResponse,
                "Response contained no text content",
            ));
        }
        Ok(documentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let hint = Some(Duration::from_secs(3));
        let e = AnthropicEndpoint::error_for_status(StatusCode::TOO_MANY_REQUESTS, hint, "");
        assert_eq!(e.reason, FailureReason::RateLimited);
        assert_eq!(e.retry_after, hint);

        let e = AnthropicEndpoint::error_for_status(StatusCode::UNAUTHORIZED, None, "");
        assert_eq!(e.reason, FailureReason::AuthenticationError);
        let e = AnthropicEndpoint::error_for_status(StatusCode::FORBIDDEN, None, "");
        assert_eq!(e.reason, FailureReason::AuthenticationError);

        let e = AnthropicEndpoint::error_for_status(StatusCode::INTERNAL_SERVER_ERROR, None, "boom");
        assert_eq!(e.reason, FailureReason::InvalidResponse);
        assert!(e.message.contains("boom"));
    }

    #[test]
    fn test_rate_limit_error_type_in_body() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Number of requests has exceeded your rate limit"}}"#;
        let e = AnthropicEndpoint::error_for_status(StatusCode::BAD_REQUEST, None, body);
        assert_eq!(e.reason, FailureReason::RateLimited);
        assert!(e.message.contains("exceeded your rate limit"));
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after("12"), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1_500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("1e20"), None);
    }

    #[test]
    fn test_messages_url_is_joined() {
        let api = ApiSettings {
            base_url: "http://localhost:1234/".into(),
            ..ApiSettings::default()
        };
        let endpoint = AnthropicEndpoint::new("key", &api).unwrap();
        assert_eq!(endpoint.messages_url, "http://localhost:1234/v1/messages");
    }
}
