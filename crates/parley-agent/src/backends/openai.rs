use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures_util::StreamExt;
use parley_core::{Message, ParleyError, ParleyResult, Role};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any gateway that
/// implements the `/v1/chat/completions` API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Build a backend for `config`.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> Vec<serde_json::Value> {
        let mut api_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for m in messages.iter().filter(|m| m.role != Role::System) {
            api_messages.push(serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content
            }));
        }

        api_messages
    }

    fn build_body(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, messages),
        });
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        body
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let mut request = self
            .http
            .post(url)
            .header("Content-Type", "application/json");

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        // OpenRouter asks callers to identify themselves
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Parley")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> ParleyResult<String> {
        let body = self.build_body(system_prompt, messages, false);

        let resp = self
            .request()
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Upstream(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ParleyError::Upstream(e.to_string()))?;

        if !status.is_success() {
            return Err(ParleyError::Upstream(format!(
                "Model API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }

    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> ParleyResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ParleyResult<String>>)> {
        let body = self.build_body(system_prompt, messages, true);

        let resp = self
            .request()
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ParleyError::Upstream(format!(
                "Model API error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            let mut full_text = String::new();
            let mut ended = false;

            loop {
                let line = if let Some(line) = lines.next_line() {
                    line
                } else if ended {
                    // The final line may arrive without a terminator.
                    match lines.finish() {
                        Some(line) => line,
                        None => break,
                    }
                } else {
                    match byte_stream.next().await {
                        Some(Ok(chunk)) => lines.extend(&chunk),
                        Some(Err(e)) => {
                            let _ = tx
                                .send(StreamEvent::Error {
                                    message: format!("Stream read error: {e}"),
                                })
                                .await;
                            return Err(ParleyError::Upstream(format!("Stream read error: {e}")));
                        }
                        None => ended = true,
                    }
                    continue;
                };

                let Some(event) = parse_stream_line(line.trim()) else {
                    continue;
                };
                if let StreamEvent::TextDelta { text } = &event {
                    full_text.push_str(text);
                }
                // Receiver gone means the client left; stop reading so the
                // provider connection is dropped.
                if tx.send(event).await.is_err() {
                    debug!("Stream consumer dropped, abandoning completion");
                    return Err(ParleyError::Upstream("Stream consumer dropped".into()));
                }
            }

            Ok(full_text)
        });

        Ok((rx, handle))
    }
}

/// Splits a byte stream into lines, decoding each line only once it is
/// complete so multi-byte characters split across chunks survive.
#[derive(Debug, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk as received from the network.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Take the next complete line, without its `\n` terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).take(end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.bytes);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Extract the assistant text from a non-streaming completion body.
pub fn parse_openai_response(body: &serde_json::Value) -> ParleyResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ParleyError::Upstream(format!("Completion carried no text: {body}")))
}

/// Parse one SSE line of a streaming completion.
///
/// Returns `None` for blank lines, comments, and payloads that carry nothing
/// for the caller (role-only deltas, unparsable keep-alives).
pub fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(StreamEvent::Done);
    }

    let event: serde_json::Value = serde_json::from_str(data).ok()?;
    if let Some(message) = event["error"]["message"].as_str() {
        return Some(StreamEvent::Error {
            message: message.to_string(),
        });
    }

    let choice = &event["choices"][0];
    if let Some(content) = choice["delta"]["content"].as_str() {
        if !content.is_empty() {
            return Some(StreamEvent::TextDelta {
                text: content.to_string(),
            });
        }
    }
    if choice["finish_reason"].is_string() {
        return Some(StreamEvent::Done);
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_text() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}]
        });
        assert_eq!(parse_openai_response(&body).unwrap(), "hello");
    }

    #[test]
    fn test_parse_response_without_text_is_upstream_error() {
        let body = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_openai_response(&body),
            Err(ParleyError::Upstream(_))
        ));
    }

    #[test]
    fn test_parse_stream_line_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(
            parse_stream_line(line),
            Some(StreamEvent::TextDelta { text: "Hel".into() })
        );
    }

    #[test]
    fn test_parse_stream_line_done_and_noise() {
        assert_eq!(parse_stream_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(parse_stream_line(": keep-alive"), None);
        assert_eq!(parse_stream_line(""), None);
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            Some(StreamEvent::Done)
        );
    }

    #[test]
    fn test_parse_stream_line_error_payload() {
        let line = r#"data: {"error":{"message":"rate limited"}}"#;
        assert_eq!(
            parse_stream_line(line),
            Some(StreamEvent::Error {
                message: "rate limited".into()
            })
        );
    }

    #[test]
    fn test_line_buffer_keeps_character_split_across_chunks() {
        let line = r#"data: {"choices":[{"delta":{"content":"안녕"}}]}"#;
        let bytes = format!("{line}\n").into_bytes();
        // Cut inside the three-byte encoding of the first syllable.
        let cut = line.find('안').unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.extend(&bytes[..cut]);
        assert_eq!(lines.next_line(), None);
        lines.extend(&bytes[cut..]);

        let decoded = lines.next_line().unwrap();
        assert_eq!(
            parse_stream_line(&decoded),
            Some(StreamEvent::TextDelta { text: "안녕".into() })
        );
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_line_buffer_returns_unterminated_tail() {
        let mut lines = LineBuffer::default();
        lines.extend(b"data: one\r\ndata: tw");
        lines.extend(b"o");

        assert_eq!(lines.next_line().as_deref(), Some("data: one\r"));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.finish().as_deref(), Some("data: two"));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_build_messages_puts_system_first() {
        let backend = OpenAiBackend::new(ModelConfig {
            model_id: "m".into(),
            ..ModelConfig::default()
        });
        let msgs = backend.build_messages(
            Some("sys"),
            &[Message::user("hi"), Message::system("ignored"), Message::assistant("yo")],
        );
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[1]["role"], "user");
        assert_eq!(msgs[2]["content"], "yo");
    }
}
