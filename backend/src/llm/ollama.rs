use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm::CompletionStream;

/// Shown to the user whenever the inference server cannot produce a
/// completion. Chat continuity is prioritized over a missing completion, so
/// gateway failures degrade to this string instead of erroring.
pub const FALLBACK_RESPONSE: &str = "I'm sorry, I'm having trouble connecting to my knowledge base right now. Please try again later.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    context: Option<Value>,
}

/// Client for the Ollama `/api/generate` endpoint.
pub struct OllamaClient {
    http: HttpClient,
    url: String,
    // Opaque per-conversation context tokens returned by the server. Passed
    // back verbatim on the next call, never interpreted locally.
    contexts: Mutex<HashMap<Uuid, Value>>,
}

impl OllamaClient {
    /// # Errors
    ///
    /// Returns `GatewayError` if the underlying HTTP client cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, AppError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::GatewayError(format!("HTTP client error: {e}")))?;

        Ok(Self {
            http,
            url,
            contexts: Mutex::new(HashMap::new()),
        })
    }

    /// One synchronous (non-streaming) completion. Network failures,
    /// timeouts, non-2xx statuses and responses without a `response` field
    /// all degrade to [`FALLBACK_RESPONSE`].
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn generate(&self, model: &str, prompt: &str, conversation_id: Uuid) -> String {
        match self.try_generate(model, prompt, conversation_id).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, model, "Inference call failed, using fallback response");
                FALLBACK_RESPONSE.to_string()
            }
        }
    }

    async fn try_generate(
        &self,
        model: &str,
        prompt: &str,
        conversation_id: Uuid,
    ) -> Result<String, AppError> {
        let context = self
            .contexts
            .lock()
            .expect("context map lock poisoned")
            .get(&conversation_id)
            .cloned();

        let payload = GenerateRequest {
            model,
            prompt,
            stream: false,
            context,
        };

        let response = self.http.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(AppError::GatewayError(format!(
                "HTTP {} from inference endpoint",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        let Some(text) = body.response else {
            return Err(AppError::GatewayError(
                "No 'response' field in inference response".to_string(),
            ));
        };

        if let Some(ctx) = body.context {
            self.contexts
                .lock()
                .expect("context map lock poisoned")
                .insert(conversation_id, ctx);
        }

        Ok(text)
    }

    /// Drops the retained inference context for a conversation. Called when
    /// the user starts or switches to another conversation.
    pub fn forget_context(&self, conversation_id: Uuid) {
        self.contexts
            .lock()
            .expect("context map lock poisoned")
            .remove(&conversation_id);
    }

    /// Streaming completion: yields each NDJSON `response` fragment as it
    /// arrives. Connection failures degrade to a single fallback fragment;
    /// malformed lines are skipped.
    pub fn generate_stream(&self, model: &str, prompt: &str) -> CompletionStream {
        let request = self.http.post(&self.url).json(&GenerateRequest {
            model,
            prompt,
            stream: true,
            context: None,
        });

        Box::pin(stream! {
            let response = match request.send().await {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    warn!(status = %r.status(), "Inference stream request rejected, using fallback");
                    yield Ok(FALLBACK_RESPONSE.to_string());
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Inference stream request failed, using fallback");
                    yield Ok(FALLBACK_RESPONSE.to_string());
                    return;
                }
            };

            let mut upstream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = upstream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Inference stream interrupted");
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<GenerateResponse>(line) {
                        Ok(GenerateResponse { response: Some(fragment), .. }) => {
                            yield Ok(fragment);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(error = %e, "Skipping malformed NDJSON line");
                        }
                    }
                }
            }

            // A final line without a trailing newline is still a fragment.
            let line = buffer.trim();
            if !line.is_empty() {
                if let Ok(GenerateResponse { response: Some(fragment), .. }) =
                    serde_json::from_str::<GenerateResponse>(line)
                {
                    yield Ok(fragment);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_absent_context() {
        let payload = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "hello",
            stream: false,
            context: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("context").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_request_carries_context_verbatim() {
        let payload = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "hello",
            stream: false,
            context: Some(serde_json::json!([1, 2, 3])),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["context"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_response_field_is_optional() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.response.is_none());
        assert!(parsed.context.is_none());
    }

    #[test]
    fn test_context_bookkeeping() {
        let client =
            OllamaClient::new("http://localhost:0".to_string(), Duration::from_secs(1)).unwrap();
        let conversation_id = Uuid::new_v4();
        client
            .contexts
            .lock()
            .unwrap()
            .insert(conversation_id, serde_json::json!([42]));
        client.forget_context(conversation_id);
        assert!(client.contexts.lock().unwrap().is_empty());
    }
}
