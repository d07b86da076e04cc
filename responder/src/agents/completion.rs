// Completion Agent: chat completion against an OpenAI-compatible endpoint

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::CompletionService;

pub struct CompletionAgent {
    client: reqwest::Client,
    url_chat: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionAgent {
    pub fn new(llm_endpoint: &str, model: String, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let url_chat = format!("{}/v1/chat/completions", llm_endpoint.trim_end_matches('/'));
        info!("Completion agent using model {} at {}", model, url_chat);

        Ok(Self {
            client,
            url_chat,
            model,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionService for CompletionAgent {
    async fn complete(&self, system_role: &str, prompt: &str, temperature: f32) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_role },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature,
        };

        let mut req = self.client.post(&self.url_chat).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.context("completion endpoint unreachable")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Completion: endpoint returned {}: {}", status, body);
            anyhow::bail!("completion endpoint returned {}: {}", status, body);
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .context("completion endpoint sent an unreadable response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("completion response has no choices")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ],
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let agent =
            CompletionAgent::new(&server.uri(), "gpt-test".to_string(), Some("sk-test".to_string()), 5)
                .unwrap();
        let answer = agent.complete("be brief", "hello", 0.0).await.unwrap();
        assert_eq!(answer, "hi there");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let agent = CompletionAgent::new(&server.uri(), "gpt-test".to_string(), None, 5).unwrap();
        let err = agent.complete("role", "prompt", 0.2).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let agent = CompletionAgent::new(&server.uri(), "gpt-test".to_string(), None, 5).unwrap();
        let err = agent.complete("role", "prompt", 0.0).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
