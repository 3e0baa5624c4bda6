//! Upstream streaming chat completions.
//!
//! [`Upstream`] is the capability the session driver depends on: open one
//! streamed completion and yield its text fragments. Vendors differ only in
//! URL, key and model, so a single OpenAI-compatible client serves them all.

use std::pin::Pin;
use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::Client;

use super::stream::{error_message, parse_fragment, SseDecoder, SseLine};
use super::types::{ChatCompletionRequest, Message};
use crate::config::CompletionConfig;
use crate::error::{Error, Result};
use crate::router::SelectedProvider;

/// Incremental text fragments from one upstream completion.
///
/// Ends after the upstream terminator, or with a single `Err` item. Dropping
/// the stream closes the upstream connection.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        CompletionParams::from(&CompletionConfig::default())
    }
}

impl From<&CompletionConfig> for CompletionParams {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Opens a streamed chat completion against a provider.
pub trait Upstream: Send + Sync {
    /// Start a completion. No network I/O happens until the stream is polled.
    fn open_stream(
        &self,
        provider: &SelectedProvider,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> FragmentStream;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiUpstream {
    client: Client,
}

impl OpenAiUpstream {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client with the given connect timeout and no overall
    /// request timeout, since completions stream for as long as they need.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::new(client))
    }
}

impl Upstream for OpenAiUpstream {
    fn open_stream(
        &self,
        provider: &SelectedProvider,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> FragmentStream {
        let client = self.client.clone();
        let provider = provider.clone();

        Box::pin(try_stream! {
            let api_key = provider.api_key.clone().ok_or(Error::MissingApiKey)?;
            let url = format!("{}/chat/completions", provider.url.trim_end_matches('/'));
            let body = ChatCompletionRequest {
                model: &provider.model,
                messages: &messages,
                stream: true,
                temperature: params.temperature,
                max_tokens: params.max_tokens,
            };

            tracing::debug!(provider = %provider.name, url = %url, "Opening upstream stream");

            let response = client
                .post(&url)
                .bearer_auth(api_key.expose_secret())
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, provider = %provider.name, "Failed to reach provider");
                    Error::Upstream(e)
                })?;

            let response = ensure_success(response, &provider.name).await?;

            let mut decoder = SseDecoder::new();
            let mut bytes = response.bytes_stream();
            let mut done = false;
            let mut fragments = 0usize;

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| {
                    tracing::error!(error = %e, provider = %provider.name, "Error streaming from provider");
                    Error::Upstream(e)
                })?;
                for line in decoder.feed(&chunk) {
                    match line {
                        SseLine::Done => {
                            done = true;
                            break 'read;
                        }
                        SseLine::Data(data) => {
                            if let Some(fragment) = parse_fragment(&data)? {
                                fragments += 1;
                                yield fragment;
                            }
                        }
                    }
                }
            }

            if !done {
                if let Some(SseLine::Data(data)) = decoder.finish() {
                    if let Some(fragment) = parse_fragment(&data)? {
                        fragments += 1;
                        yield fragment;
                    }
                }
            }

            tracing::debug!(provider = %provider.name, fragments, done, "Upstream stream finished");
        })
    }
}

/// Turn a non-2xx upstream response into a provider error.
async fn ensure_success(response: reqwest::Response, provider: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    tracing::error!(
        status = %status,
        provider = %provider,
        body = %error_body,
        "Provider returned error"
    );

    let detail = serde_json::from_str::<serde_json::Value>(&error_body)
        .ok()
        .and_then(|v| v.get("error").map(error_message))
        .unwrap_or(error_body);

    Err(Error::Provider(
        format!("Provider returned {}: {}", status, detail)
            .trim_end_matches([' ', ':'])
            .to_string(),
    ))
}
