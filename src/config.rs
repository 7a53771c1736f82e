use crate::state::StyleMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hard ceiling on the requested slide count; larger values are clamped.
pub const SLIDE_COUNT_CAP: usize = 30;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_slide_count")]
    pub slide_count: usize,

    #[serde(default)]
    pub style_mode: StyleMode,

    /// Verbatim design-system override. When non-empty, no remote derivation
    /// happens at all.
    #[serde(default)]
    pub custom_style: String,

    /// Language for slide titles and body text.
    #[serde(default = "default_narrative_language")]
    pub narrative_language: String,

    /// Language for visual descriptions handed to the image model.
    #[serde(default = "default_visual_language")]
    pub visual_language: String,

    /// Pause between chained slide generations. Doubles as pacing and as a
    /// light brake on a rate-limited backend, so it stays a knob.
    #[serde(default = "default_chain_delay_ms")]
    pub chain_delay_ms: u64,

    pub llm: LlmConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // only "gemini" is implemented
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_resolution")]
    pub resolution: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Per-attempt cap in seconds. Unset means the call runs as long as the
    /// backend lets it.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            request_timeout_secs: None,
        }
    }
}

fn default_input() -> String {
    "input".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_slide_count() -> usize {
    8
}
fn default_narrative_language() -> String {
    "Traditional Chinese".to_string()
}
fn default_visual_language() -> String {
    "English".to_string()
}
fn default_chain_delay_ms() -> u64 {
    1000
}
fn default_primary_model() -> String {
    "gemini-2.5-pro".to_string()
}
fn default_fallback_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_aspect_ratio() -> String {
    "16:9".to_string()
}
fn default_resolution() -> String {
    "2K".to_string()
}
fn default_max_attempts() -> u32 {
    4
}
fn default_initial_delay_ms() -> u64 {
    3000
}
fn default_backoff_multiplier() -> u32 {
    2
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.input_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    pub fn effective_slide_count(&self) -> usize {
        self.slide_count.clamp(1, SLIDE_COUNT_CAP)
    }

    pub fn retry_options(&self) -> crate::retry::RetryOptions {
        crate::retry::RetryOptions {
            max_attempts: self.retry.max_attempts,
            initial_delay: std::time::Duration::from_millis(self.retry.initial_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
            request_timeout: self
                .retry
                .request_timeout_secs
                .map(std::time::Duration::from_secs),
        }
    }
}
