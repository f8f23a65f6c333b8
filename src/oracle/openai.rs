// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::prompt::Prompt;
use super::CompletionBackend;
use crate::{LibrarianError, Result};

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url
                .trim_end_matches('/')
                .trim_end_matches("/v1/chat/completions")
                .to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            max_tokens,
        })
    }

    fn request<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Sending chat completion request: model={}", self.model);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LibrarianError::OracleUnavailable(format!(
                "Chat completion returned status {}",
                response.status()
            )));
        }

        let result: ChatResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LibrarianError::OracleUnavailable("Empty completion".to_string()))
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/v1/models", self.base_url);

        let response = self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                LibrarianError::OracleUnavailable(format!(
                    "Cannot connect to {}: {}",
                    self.base_url, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(LibrarianError::OracleUnavailable(format!(
                "{} returned status {}",
                self.base_url,
                response.status()
            )));
        }
        Ok(())
    }
}
