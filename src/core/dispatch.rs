//! Chat request dispatch
//!
//! A dispatch moves through `Idle → Sending → (Streaming | Awaiting)` and ends
//! `Completed`, `Cancelled` or `Failed`. While it runs, its cancellation token
//! is registered with the [`CancellationCoordinator`] as the active chat
//! request; the registration is dropped on every terminal transition.
//!
//! Provider failures are terminal for the call. Nothing here retries.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use memchr::memchr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatCompletion, ChatMessage, ChatRequest, ChatResponse};
use crate::core::cancellation::{CancellationCoordinator, RequestKind};
use crate::core::capability::{CapabilityClassifier, DeliveryMode};
use crate::core::message::{normalize, Message};
use crate::core::providers::ClientBinding;
use crate::utils::http::{add_chat_auth, construct_api_url};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// Provider "thinking" text; shown but never part of the reply.
    Reasoning(String),
    Content(String),
}

/// Receives fragments as they arrive, for live rendering.
pub trait FragmentSink {
    fn on_fragment(&mut self, fragment: Fragment);
}

impl<F: FnMut(Fragment)> FragmentSink for F {
    fn on_fragment(&mut self, fragment: Fragment) {
        self(fragment)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending,
    Streaming,
    Awaiting,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug)]
pub enum DispatchError {
    /// The user cancelled before any reply text existed. Callers drop the
    /// pending user turn and move on without reporting a failure.
    Interrupted,
    Transport(String),
    Provider {
        status: Option<u16>,
        message: String,
    },
}

impl DispatchError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, DispatchError::Interrupted)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Interrupted => write!(f, "request was interrupted"),
            DispatchError::Transport(message) => write!(f, "{message}"),
            DispatchError::Provider { message, .. } => write!(f, "{message}"),
        }
    }
}

impl Error for DispatchError {}

fn transport_error(err: reqwest::Error) -> DispatchError {
    DispatchError::Transport(format!("Transport error: {err}"))
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render a provider error body for display: a one-line summary when one can
/// be found, followed by the body in a fenced block.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n```json\n{pretty_json}\n```"),
                None => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}

enum StreamProgress {
    Continue,
    Done,
}

/// Incremental SSE decoding plus the reply accumulator for one call.
#[derive(Default)]
struct StreamAccumulator {
    buffer: Vec<u8>,
    content: String,
    content_started: bool,
}

impl StreamAccumulator {
    fn feed<S: FragmentSink>(
        &mut self,
        bytes: &[u8],
        sink: &mut S,
    ) -> Result<StreamProgress, DispatchError> {
        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let StreamProgress::Done = self.process_line(&line, sink)? {
                return Ok(StreamProgress::Done);
            }
        }
        Ok(StreamProgress::Continue)
    }

    /// Handle a trailing line that arrived without a newline.
    fn finish<S: FragmentSink>(&mut self, sink: &mut S) -> Result<(), DispatchError> {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.process_line(&rest, sink)?;
        }
        Ok(())
    }

    fn process_line<S: FragmentSink>(
        &mut self,
        raw: &[u8],
        sink: &mut S,
    ) -> Result<StreamProgress, DispatchError> {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!("skipping invalid UTF-8 in stream: {err}");
                return Ok(StreamProgress::Continue);
            }
        };

        match extract_data_payload(line) {
            Some(payload) => self.handle_payload(payload, sink),
            None => Ok(StreamProgress::Continue),
        }
    }

    fn handle_payload<S: FragmentSink>(
        &mut self,
        payload: &str,
        sink: &mut S,
    ) -> Result<StreamProgress, DispatchError> {
        if payload == "[DONE]" {
            return Ok(StreamProgress::Done);
        }
        if payload.trim().is_empty() {
            return Ok(StreamProgress::Continue);
        }

        let response = serde_json::from_str::<ChatResponse>(payload).map_err(|_| {
            DispatchError::Provider {
                status: None,
                message: format_api_error(payload),
            }
        })?;

        let Some(choice) = response.choices.first() else {
            return Ok(StreamProgress::Continue);
        };

        if let Some(reasoning) = choice
            .delta
            .reasoning_content
            .as_deref()
            .filter(|text| !text.is_empty())
        {
            if self.content_started {
                debug!("dropping reasoning fragment received after content");
            } else {
                sink.on_fragment(Fragment::Reasoning(reasoning.to_string()));
            }
        }

        if let Some(content) = choice.delta.content.as_deref().filter(|text| !text.is_empty()) {
            self.content_started = true;
            self.content.push_str(content);
            sink.on_fragment(Fragment::Content(content.to_string()));
        }

        Ok(StreamProgress::Continue)
    }
}

pub struct Dispatcher {
    client: reqwest::Client,
    classifier: Arc<CapabilityClassifier>,
    coordinator: Arc<CancellationCoordinator>,
}

impl Dispatcher {
    pub fn new(
        client: reqwest::Client,
        classifier: Arc<CapabilityClassifier>,
        coordinator: Arc<CancellationCoordinator>,
    ) -> Self {
        Self {
            client,
            classifier,
            coordinator,
        }
    }

    pub fn classify(&self, model: &str) -> DeliveryMode {
        self.classifier.classify(model)
    }

    pub fn coordinator(&self) -> &Arc<CancellationCoordinator> {
        &self.coordinator
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Normalize, classify and send. Returns the reply text.
    ///
    /// A streamed reply cancelled after content has arrived returns the text
    /// received so far as a normal result.
    pub async fn dispatch<S: FragmentSink>(
        &self,
        binding: &ClientBinding,
        messages: &[Message],
        model: &str,
        sink: &mut S,
    ) -> Result<String, DispatchError> {
        let mode = self.classify(model);
        self.dispatch_with_mode(binding, messages, model, mode, sink)
            .await
    }

    pub async fn dispatch_with_mode<S: FragmentSink>(
        &self,
        binding: &ClientBinding,
        messages: &[Message],
        model: &str,
        mode: DeliveryMode,
        sink: &mut S,
    ) -> Result<String, DispatchError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: normalize(messages).iter().map(ChatMessage::from).collect(),
            stream: mode == DeliveryMode::Incremental,
        };

        let cancel_token = CancellationToken::new();
        let _in_flight = self
            .coordinator
            .register(RequestKind::ChatStream, cancel_token.clone());

        log_state(model, DispatchState::Idle);
        log_state(model, DispatchState::Sending);
        let result = match mode {
            DeliveryMode::Incremental => {
                self.stream_reply(binding, &request, &cancel_token, sink)
                    .await
            }
            DeliveryMode::Blocking => {
                self.await_reply(binding, &request, &cancel_token, sink)
                    .await
            }
        };

        let terminal = match &result {
            Ok(_) if cancel_token.is_cancelled() => DispatchState::Cancelled,
            Ok(_) => DispatchState::Completed,
            Err(DispatchError::Interrupted) => DispatchState::Cancelled,
            Err(_) => DispatchState::Failed,
        };
        log_state(model, terminal);
        result
    }

    fn build_request(
        &self,
        binding: &ClientBinding,
        request: &ChatRequest,
    ) -> reqwest::RequestBuilder {
        let chat_url = construct_api_url(&binding.base_url, "chat/completions");
        let http_request = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json");
        let http_request = if request.stream {
            http_request.header("Accept", "text/event-stream")
        } else {
            http_request
        };
        add_chat_auth(http_request, binding.api_key.as_deref()).json(request)
    }

    async fn send(
        &self,
        binding: &ClientBinding,
        request: &ChatRequest,
        cancel_token: &CancellationToken,
    ) -> Result<reqwest::Response, DispatchError> {
        let response = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(DispatchError::Interrupted),
            response = self.build_request(binding, request).send() => {
                response.map_err(transport_error)?
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        Err(DispatchError::Provider {
            status: Some(status.as_u16()),
            message: format_api_error(&error_text),
        })
    }

    async fn stream_reply<S: FragmentSink>(
        &self,
        binding: &ClientBinding,
        request: &ChatRequest,
        cancel_token: &CancellationToken,
        sink: &mut S,
    ) -> Result<String, DispatchError> {
        let response = self.send(binding, request, cancel_token).await?;
        log_state(&request.model, DispatchState::Streaming);

        let mut stream = response.bytes_stream();
        let mut accumulator = StreamAccumulator::default();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    return if accumulator.content.is_empty() {
                        Err(DispatchError::Interrupted)
                    } else {
                        Ok(accumulator.content)
                    };
                }
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    if let StreamProgress::Done = accumulator.feed(&bytes, sink)? {
                        return Ok(accumulator.content);
                    }
                }
                Some(Err(err)) => return Err(transport_error(err)),
                None => {
                    accumulator.finish(sink)?;
                    return Ok(accumulator.content);
                }
            }
        }
    }

    async fn await_reply<S: FragmentSink>(
        &self,
        binding: &ClientBinding,
        request: &ChatRequest,
        cancel_token: &CancellationToken,
        sink: &mut S,
    ) -> Result<String, DispatchError> {
        let response = self.send(binding, request, cancel_token).await?;
        log_state(&request.model, DispatchState::Awaiting);

        let status = response.status().as_u16();
        let body = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(DispatchError::Interrupted),
            body = response.text() => body.map_err(transport_error)?,
        };

        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(|_| DispatchError::Provider {
                status: Some(status),
                message: format_api_error(&body),
            })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| DispatchError::Provider {
                status: Some(status),
                message: "no response content".to_string(),
            })?;

        if let Some(reasoning) = message.reasoning_content.filter(|text| !text.is_empty()) {
            sink.on_fragment(Fragment::Reasoning(reasoning));
        }
        Ok(message.content.unwrap_or_default())
    }
}

fn log_state(model: &str, state: DispatchState) {
    debug!(model, ?state, "dispatch state");
}
