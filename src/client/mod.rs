//! Documentation client: one file in, one documentation result out.

mod anthropic;

use std::sync::Arc;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use crate::config::{ApiSettings, RunConfig};
use crate::error::{EndpointError, FailureReason};
use crate::prompts;
use crate::walker::{FileContent, FileDescriptor};

pub use anthropic::{AnthropicEndpoint, ANTHROPIC_VERSION};

/// Parameters of a single completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Output token budget
    pub max_tokens: u32,
    /// User prompt
    pub prompt: String,
}

/// Text generation backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationEndpoint: Send + Sync {
    /// Sends one prompt and returns the generated text
    async fn complete(&self, request: CompletionRequest) -> Result<String, EndpointError>;
}

/// Why a file was documented without calling the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCause {
    /// File bytes are not UTF-8 text
    NonTextContent,
}

impl SkipCause {
    /// Stable snake_case tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonTextContent => "non_text_content",
        }
    }
}

/// Status of one file's documentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Documentation was generated
    Success {
        /// Markdown produced by the endpoint
        documentation: String,
        /// The input was cut to the budget before sending
        truncated: bool,
    },
    /// The endpoint call failed terminally
    Failed {
        /// Failure class
        reason: FailureReason,
        /// Detail from the endpoint or transport
        message: String,
    },
    /// No call was made
    Skipped {
        /// Why the file was skipped
        cause: SkipCause,
    },
}

/// Result for one eligible file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationResult {
    /// Relative path of the source file
    pub path: String,
    /// Language tag of the source file
    pub language: Option<String>,
    /// Status and payload
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Retries spent before this outcome
    pub retries: u32,
}

impl DocumentationResult {
    /// Builds a result for `descriptor`
    pub fn new(descriptor: &FileDescriptor, outcome: Outcome, retries: u32) -> Self {
        Self {
            path: descriptor.path.clone(),
            language: descriptor.language.map(str::to_string),
            outcome,
            retries,
        }
    }

    /// Builds a result from the last call attempt
    pub fn from_call(
        descriptor: &FileDescriptor,
        call: Result<String, EndpointError>,
        truncated: bool,
        retries: u32,
    ) -> Self {
        let outcome = match call {
            Ok(documentation) => Outcome::Success { documentation, truncated },
            Err(e) => Outcome::Failed { reason: e.reason, message: e.message },
        };
        Self::new(descriptor, outcome, retries)
    }

    /// Checks for a successful outcome
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Generated documentation on success
    pub fn documentation(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { documentation, .. } => Some(documentation),
            _ => None,
        }
    }

    /// Failure reason on failure
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match &self.outcome {
            Outcome::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Checks for a success whose input was cut
    pub fn is_truncated(&self) -> bool {
        matches!(self.outcome, Outcome::Success { truncated: true, .. })
    }

    /// Short status tag for progress and summaries
    pub fn status_str(&self) -> &'static str {
        match &self.outcome {
            Outcome::Success { .. } => "success",
            Outcome::Failed { .. } => "failed",
            Outcome::Skipped { .. } => "skipped",
        }
    }
}

/// What to do for one descriptor before any call is made
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Send this request
    Call {
        /// Completion parameters
        request: CompletionRequest,
        /// Whether the content was cut to the input budget
        truncated: bool,
    },
    /// Record a skip without calling
    Skip(SkipCause),
}

/// Wraps a [`GenerationEndpoint`] with the model settings of the application
#[derive(Clone)]
pub struct DocumentationClient {
    endpoint: Arc<dyn GenerationEndpoint>,
    api: ApiSettings,
}

impl DocumentationClient {
    /// Creates a client over `endpoint`
    pub fn new(endpoint: Arc<dyn GenerationEndpoint>, api: ApiSettings) -> Self {
        Self { endpoint, api }
    }

    /// Model settings used for requests
    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    /// Builds the request for `descriptor`, or the reason no call is needed
    pub fn prepare(&self, descriptor: &FileDescriptor, run: &RunConfig) -> Prepared {
        let text = match &descriptor.content {
            FileContent::Text(text) => text,
            FileContent::NonText => return Prepared::Skip(SkipCause::NonTextContent),
        };

        let (content, truncated) = prompts::truncate_content(
            text,
            run.truncation.max_input_chars,
            run.truncation.boundary_ratio,
        );
        if truncated {
            debug!("Truncated {} to {} chars", descriptor.path, run.truncation.max_input_chars);
        }

        let prompt = prompts::file_prompt(&descriptor.path, descriptor.language, run.detail_level, &content);
        Prepared::Call {
            request: CompletionRequest {
                model: self.api.model.clone(),
                temperature: self.api.temperature,
                max_tokens: self.api.max_tokens_for(run.detail_level),
                prompt,
            },
            truncated,
        }
    }

    /// Sends one prepared request
    pub async fn call(&self, request: CompletionRequest) -> Result<String, EndpointError> {
        self.endpoint.complete(request).await
    }

    /// Documents one file with a single endpoint call and no retries
    pub async fn generate(&self, descriptor: &FileDescriptor, run: &RunConfig) -> DocumentationResult {
        match self.prepare(descriptor, run) {
            Prepared::Skip(cause) => DocumentationResult::new(descriptor, Outcome::Skipped { cause }, 0),
            Prepared::Call { request, truncated } => {
                let call = self.call(request).await;
                DocumentationResult::from_call(descriptor, call, truncated, 0)
            }
        }
    }

    /// Issues the project overview call
    pub async fn generate_overview(&self, prompt: String) -> Result<String, EndpointError> {
        self.call(CompletionRequest {
            model: self.api.model.clone(),
            temperature: self.api.temperature,
            max_tokens: self.api.overview_max_tokens,
            prompt,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DetailLevel};
    use mockall::predicate::function;

    fn descriptor(content: FileContent) -> FileDescriptor {
        FileDescriptor {
            path: "src/app.py".into(),
            language: Some("Python"),
            size: 12,
            content,
        }
    }

    fn client(endpoint: MockGenerationEndpoint) -> DocumentationClient {
        DocumentationClient::new(Arc::new(endpoint), ApiSettings::default())
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint
            .expect_complete()
            .with(function(|r: &CompletionRequest| {
                r.max_tokens == 8_000 && r.prompt.contains("File: src/app.py")
            }))
            .times(1)
            .returning(|_| Ok("# app.py\nDocs".to_string()));

        let mut run = Config::default().run_config();
        run.detail_level = DetailLevel::Expert;
        let result = client(endpoint).generate(&descriptor(FileContent::Text("print(1)".into())), &run).await;

        assert!(result.is_success());
        assert_eq!(result.documentation(), Some("# app.py\nDocs"));
        assert_eq!(result.language.as_deref(), Some("Python"));
        assert_eq!(result.retries, 0);
    }

    #[tokio::test]
    async fn test_generate_failure_is_recorded() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint
            .expect_complete()
            .times(1)
            .returning(|_| Err(EndpointError::new(FailureReason::InvalidResponse, "HTTP 500")));

        let run = Config::default().run_config();
        let result = client(endpoint).generate(&descriptor(FileContent::Text("x".into())), &run).await;

        assert_eq!(result.failure_reason(), Some(FailureReason::InvalidResponse));
        assert_eq!(result.status_str(), "failed");
    }

    #[tokio::test]
    async fn test_non_text_is_skipped_without_call() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint.expect_complete().times(0);

        let run = Config::default().run_config();
        let result = client(endpoint).generate(&descriptor(FileContent::NonText), &run).await;

        assert_eq!(result.outcome, Outcome::Skipped { cause: SkipCause::NonTextContent });
    }

    #[tokio::test]
    async fn test_long_content_is_flagged_truncated() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint
            .expect_complete()
            .with(function(|r: &CompletionRequest| r.prompt.contains("[Content truncated...]")))
            .returning(|_| Ok("docs".to_string()));

        let mut run = Config::default().run_config();
        run.truncation.max_input_chars = 50;
        let result = client(endpoint)
            .generate(&descriptor(FileContent::Text("x".repeat(200))), &run)
            .await;

        assert!(result.is_truncated());
    }

    #[tokio::test]
    async fn test_overview_uses_overview_budget() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint
            .expect_complete()
            .with(function(|r: &CompletionRequest| r.max_tokens == 4_000 && r.prompt == "overview"))
            .returning(|_| Ok("Overview".to_string()));

        let text = client(endpoint).generate_overview("overview".into()).await.unwrap();
        assert_eq!(text, "Overview");
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let result = DocumentationResult::new(
            &descriptor(FileContent::NonText),
            Outcome::Failed {
                reason: FailureReason::RateLimited,
                message: "slow down".into(),
            },
            2,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "rate_limited");
        assert_eq!(json["retries"], 2);
        assert_eq!(json["path"], "src/app.py");
    }
}
