// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Categorization oracle: asks a language model which archive folder each
//! file name belongs in.

pub mod ollama;
pub mod openai;
pub mod parser;
pub mod prompt;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, Provider};
use crate::{LibrarianError, Result};
use prompt::{build_prompt, Prompt};

/// Suggested folder for one file; `None` when the oracle gave no usable answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySuggestion {
    pub file_name: String,
    pub folder_name: Option<String>,
}

/// A text completion endpoint
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Send one prompt and return the raw response text
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Check the endpoint is reachable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the backend selected by the configuration
pub fn backend_from_config(config: &AppConfig) -> Result<Arc<dyn CompletionBackend>> {
    let engine = &config.ai_engine;
    let timeout = Duration::from_secs(engine.timeout_secs);

    match engine.provider {
        Provider::Ollama => Ok(Arc::new(ollama::OllamaClient::new(
            &engine.base_url(),
            &engine.model_name(),
            timeout,
        )?)),
        Provider::OpenAi => {
            let api_key = std::env::var(&engine.api_key_env).map_err(|_| {
                LibrarianError::Config(format!(
                    "{} is not set; it is required for the openai provider",
                    engine.api_key_env
                ))
            })?;
            Ok(Arc::new(openai::OpenAiClient::new(
                &engine.base_url(),
                &engine.model_name(),
                &api_key,
                engine.max_tokens,
                timeout,
            )?))
        }
    }
}

/// Client side of the categorization contract.
///
/// `suggest` never fails: transport and parse problems turn into `None`
/// suggestions, and the output always has one entry per requested name.
#[derive(Clone)]
pub struct Categorizer {
    backend: Arc<dyn CompletionBackend>,
    system_prompt: String,
    retries: u32,
    max_request: usize,
}

impl Categorizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
            retries: 0,
            max_request: 10,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend = backend_from_config(config)?;
        Ok(Self::new(backend, config.prompts.system.clone())
            .with_retries(config.ai_engine.retries)
            .with_max_request(config.ai_engine.request_batch_size))
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_max_request(mut self, max_request: usize) -> Self {
        self.max_request = max_request.max(1);
        self
    }

    /// Largest number of names sent in one request
    pub fn max_request(&self) -> usize {
        self.max_request
    }

    pub fn backend(&self) -> &dyn CompletionBackend {
        self.backend.as_ref()
    }

    /// Ask for a folder for each of `file_names`, given the folders that exist.
    pub async fn suggest(
        &self,
        file_names: &[String],
        known_folders: &[String],
    ) -> Vec<CategorySuggestion> {
        if file_names.is_empty() {
            return Vec::new();
        }

        info!("Requesting categories for {} files: {}", file_names.len(), file_names.join(", "));
        let prompt = build_prompt(&self.system_prompt, file_names, known_folders);

        let text = match self.complete_with_retry(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Categorization request via {} failed: {}", self.backend.name(), e);
                return none_for_all(file_names);
            }
        };
        debug!("Oracle response:\n{}", text);

        let parsed = parser::parse_suggestions(&text);
        let suggestions = parser::align(file_names, &parsed);
        for s in suggestions.iter().filter(|s| s.folder_name.is_none()) {
            warn!("No usable category in oracle response for {}", s.file_name);
        }
        suggestions
    }

    async fn complete_with_retry(&self, prompt: &Prompt) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!("Retrying oracle request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.backend.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LibrarianError::OracleUnavailable("Unknown error".to_string())
        }))
    }
}

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 1s, 2s, 4s, ... capped at `MAX_BACKOFF`
fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

fn none_for_all(file_names: &[String]) -> Vec<CategorySuggestion> {
    file_names
        .iter()
        .map(|name| CategorySuggestion {
            file_name: name.clone(),
            folder_name: None,
        })
        .collect()
}
