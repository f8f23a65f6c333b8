// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Librarian

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{LibrarianError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Watched root, holding area and archive locations
    #[serde(default)]
    pub paths: PathConfig,

    /// Age threshold, batching and sweep timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Categorization oracle configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Which files are never sorted
    #[serde(default)]
    pub filters: FilterConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathConfig {
    #[serde(default = "default_watch_root")]
    pub watch_root: String,
    /// Defaults to `<watch_root>/Recents`
    #[serde(default)]
    pub recents: Option<String>,
    /// Defaults to `<watch_root>/AI Library`
    #[serde(default)]
    pub library: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: u64,
    #[serde(default = "default_batch_debounce_ms")]
    pub batch_debounce_ms: u64,
    #[serde(default = "default_batch_max")]
    pub batch_max: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_stability_wait_secs")]
    pub stability_wait_secs: u64,
}

/// Which completion API the oracle talks to
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAi,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    /// Defaults to the provider's usual endpoint
    #[serde(default)]
    pub url: Option<String>,
    /// Defaults to a small model for the provider
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key (OpenAI only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Maximum number of file names per oracle request
    #[serde(default = "default_request_batch_size")]
    pub request_batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_system_prompt")]
    pub system: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FilterConfig {
    /// Extensions (without the dot) that are never moved
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,
    /// Glob patterns for in-progress download names
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

// Default value functions
fn default_recent_window_hours() -> u64 { 72 }
fn default_batch_debounce_ms() -> u64 { 3000 }
fn default_batch_max() -> usize { 10 }
fn default_sweep_interval_secs() -> u64 { 3600 }
fn default_stability_wait_secs() -> u64 { 10 }
fn default_provider() -> Provider { Provider::Ollama }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 2 }
fn default_max_tokens() -> u32 { 1000 }
fn default_request_batch_size() -> usize { 10 }

fn default_watch_root() -> String {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("Downloads").to_string_lossy().to_string(),
        None => "./Downloads".to_string(),
    }
}

fn default_excluded_extensions() -> Vec<String> {
    vec!["dng", "dmg", "pkg", "mpkg", "app"]
        .into_iter().map(String::from).collect()
}

fn default_ignore_patterns() -> Vec<String> {
    vec!["*.tmp", "*.part", "*.crdownload", "*.partial", "*.download"]
        .into_iter().map(String::from).collect()
}

fn default_system_prompt() -> String {
    "You are an assistant that helps organize files by suggesting appropriate folders \
     based on file names. If applicable, match the file to one of the existing folders \
     rather than creating a new folder, but do not over-optimize: images should not go \
     in a Books folder, and PDFs should not be put into a generic Documents folder. \
     Respond with exactly one folder name per file, at most 5 words, fairly generic. \
     For example, for a file called 4runner.pdf suggest \"Vehicles\"; for a file called \
     The Seven Expectations of Great Managing use \"Business Articles\". A generic \
     screenshot goes in \"Screenshots\". Do not add any text before or after the list. \
     Respond in this exact format, one line per file: filename: foldername".to_string()
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            watch_root: default_watch_root(),
            recents: None,
            library: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            recent_window_hours: default_recent_window_hours(),
            batch_debounce_ms: default_batch_debounce_ms(),
            batch_max: default_batch_max(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stability_wait_secs: default_stability_wait_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            max_tokens: default_max_tokens(),
            request_batch_size: default_request_batch_size(),
        }
    }
}

impl EngineConfig {
    pub fn base_url(&self) -> String {
        match (&self.url, self.provider) {
            (Some(url), _) => url.clone(),
            (None, Provider::Ollama) => "http://localhost:11434".to_string(),
            (None, Provider::OpenAi) => "https://api.openai.com".to_string(),
        }
    }

    pub fn model_name(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) => model.clone(),
            (None, Provider::Ollama) => "llama3.2:3b".to_string(),
            (None, Provider::OpenAi) => "gpt-3.5-turbo".to_string(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { system: default_system_prompt() }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_extensions: default_excluded_extensions(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathConfig::default(),
            timing: TimingConfig::default(),
            ai_engine: EngineConfig::default(),
            prompts: PromptConfig::default(),
            filters: FilterConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| LibrarianError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Point the config at a different watch root. Explicit recents/library
    /// locations are dropped so they follow the new root.
    pub fn with_watch_root(mut self, root: &Path) -> Self {
        self.paths.watch_root = root.to_string_lossy().to_string();
        self.paths.recents = None;
        self.paths.library = None;
        self
    }

    pub fn watch_root(&self) -> PathBuf {
        PathBuf::from(&self.paths.watch_root)
    }

    pub fn recents_dir(&self) -> PathBuf {
        match &self.paths.recents {
            Some(p) => PathBuf::from(p),
            None => self.watch_root().join("Recents"),
        }
    }

    pub fn library_dir(&self) -> PathBuf {
        match &self.paths.library {
            Some(p) => PathBuf::from(p),
            None => self.watch_root().join("AI Library"),
        }
    }

    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.timing.recent_window_hours as i64)
    }

    pub fn batch_debounce(&self) -> Duration {
        Duration::from_millis(self.timing.batch_debounce_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.timing.sweep_interval_secs)
    }

    pub fn stability_wait(&self) -> Duration {
        Duration::from_secs(self.timing.stability_wait_secs)
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.paths.watch_root.trim().is_empty() {
            return Err(LibrarianError::Config("watch_root must not be empty".to_string()));
        }
        if self.timing.batch_max == 0 {
            return Err(LibrarianError::Config("batch_max must be at least 1".to_string()));
        }
        if self.ai_engine.request_batch_size == 0 {
            return Err(LibrarianError::Config(
                "request_batch_size must be at least 1".to_string(),
            ));
        }
        if self.timing.batch_debounce_ms == 0 || self.timing.sweep_interval_secs == 0 {
            return Err(LibrarianError::Config(
                "batch_debounce_ms and sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        let root = self.watch_root();
        if self.recents_dir() == root || self.library_dir() == root {
            return Err(LibrarianError::Config(
                "recents and library must differ from the watch root".to_string(),
            ));
        }
        if self.recents_dir() == self.library_dir() {
            return Err(LibrarianError::Config(
                "recents and library must be different directories".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the watch root, holding area and archive root
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.watch_root(), self.recents_dir(), self.library_dir()] {
            if !dir.is_dir() {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    LibrarianError::Config(format!("Cannot create {:?}: {}", dir, e))
                })?;
                tracing::info!("Created folder: {:?}", dir);
            }
        }
        Ok(())
    }
}
