//! Non-streaming client for OpenAI-compatible `chat/completions` endpoints.
//!
//! Only `role` and `content` go over the wire. Timestamps stay local.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use timeline_core::Message;

use crate::provider::{CompletionProvider, LLMError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_MODEL: &str = "grok-beta";

pub struct OpenAICompatProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    site_url: Option<String>,
    site_name: Option<String>,
}

impl OpenAICompatProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            site_url: None,
            site_name: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Attribution headers (`HTTP-Referer`, `X-Title`) some gateways ask for.
    pub fn with_site(mut self, url: Option<String>, name: Option<String>) -> Self {
        self.site_url = url.filter(|u| !u.is_empty());
        self.site_name = name.filter(|n| !n.is_empty());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, messages: &[Message]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompatProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let body = self.build_request_body(messages);
        log::debug!(
            "Requesting completion from {} ({} messages, model {})",
            self.base_url,
            messages.len(),
            self.model
        );

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if let Some(url) = &self.site_url {
            request = request.header("HTTP-Referer", url);
        }
        if let Some(name) = &self.site_name {
            request = request.header("X-Title", name);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        let text = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LLMError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcript() -> Vec<Message> {
        vec![
            Message::system("You are a helpful assistant."),
            Message::user("Hi"),
        ]
    }

    #[test]
    fn test_default_values() {
        let provider = OpenAICompatProvider::new("test_key");
        assert_eq!(provider.api_key, "test_key");
        assert_eq!(provider.base_url, "https://api.x.ai/v1");
        assert_eq!(provider.model, "grok-beta");
        assert!(provider.site_url.is_none());
    }

    #[test]
    fn test_chained_builders() {
        let provider = OpenAICompatProvider::new("test_key")
            .with_base_url("https://openrouter.ai/api/v1/")
            .with_model("grok-2")
            .with_site(Some("https://example.com".into()), Some(String::new()));

        assert_eq!(provider.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(provider.model(), "grok-2");
        assert_eq!(provider.site_url.as_deref(), Some("https://example.com"));
        assert!(provider.site_name.is_none());
    }

    #[test]
    fn test_request_body_strips_timestamps() {
        let provider = OpenAICompatProvider::new("test_key");
        let body = provider.build_request_body(&transcript());

        assert_eq!(body["model"], "grok-beta");
        assert_eq!(
            body["messages"],
            json!([
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": "Hi" }
            ])
        );
        assert!(body.get("stream").is_none());
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(header("X-Title", "Forking Paths"))
            .and(body_partial_json(json!({ "model": "grok-beta" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Hello" } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenAICompatProvider::new("sk-test")
            .with_base_url(mock_server.uri())
            .with_site(None, Some("Forking Paths".into()));

        let reply = provider.complete(&transcript()).await.expect("completion");
        assert_eq!(reply, "Hello");
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&mock_server)
            .await;

        let provider = OpenAICompatProvider::new("nope").with_base_url(mock_server.uri());

        match provider.complete(&transcript()).await {
            Err(LLMError::Api(message)) => {
                assert!(message.contains("401"));
                assert!(message.contains("bad key"));
            }
            other => panic!("expected LLMError::Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_empty_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        let provider = OpenAICompatProvider::new("sk-test").with_base_url(mock_server.uri());

        assert!(matches!(
            provider.complete(&transcript()).await,
            Err(LLMError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let provider = OpenAICompatProvider::new("sk-test").with_base_url(mock_server.uri());

        assert!(matches!(
            provider.complete(&transcript()).await,
            Err(LLMError::Json(_))
        ));
    }
}
