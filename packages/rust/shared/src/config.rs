//! Application configuration for LeadEnrich.
//!
//! User config lives at `~/.leadenrich/leadenrich.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeadEnrichError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadenrich.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadenrich";

/// The Places API never returns more than this many items per page.
pub const MAX_PAGE_SIZE: u32 = 20;

// ---------------------------------------------------------------------------
// Config structs (matching leadenrich.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Places API settings.
    #[serde(default)]
    pub places: PlacesSection,

    /// Website scraping settings.
    #[serde(default)]
    pub website: WebsiteSection,

    /// Text-generation settings.
    #[serde(default)]
    pub generation: GenerationSection,

    /// Completeness rules shared by every stage.
    #[serde(default)]
    pub enrichment: EnrichmentSection,
}

/// `[places]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesSection {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_places_key_env")]
    pub api_key_env: String,

    /// Base URL of the Places API.
    #[serde(default = "default_places_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed delay inserted before every Places request.
    #[serde(default = "default_places_delay")]
    pub request_delay_ms: u64,

    /// Items requested per search page (clamped to 20).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PlacesSection {
    fn default() -> Self {
        Self {
            api_key_env: default_places_key_env(),
            base_url: default_places_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_places_delay(),
            page_size: default_page_size(),
        }
    }
}

fn default_places_key_env() -> String {
    "GOOGLE_MAPS_API_KEY".into()
}
fn default_places_base_url() -> String {
    "https://places.googleapis.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_places_delay() -> u64 {
    100
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

/// `[website]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteSection {
    /// Per-fetch timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay after every website fetch.
    #[serde(default = "default_website_delay")]
    pub delay_ms: u64,
}

impl Default for WebsiteSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            delay_ms: default_website_delay(),
        }
    }
}

fn default_website_delay() -> u64 {
    500
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Name of the env var holding the API key.
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible chat-completions API.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Default model to use for email generation.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Per-request timeout.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Delay after every generation call.
    #[serde(default = "default_generation_delay")]
    pub delay_ms: u64,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            api_key_env: default_generation_key_env(),
            base_url: default_generation_base_url(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            delay_ms: default_generation_delay(),
        }
    }
}

fn default_generation_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_generation_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f64 {
    0.7
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_generation_delay() -> u64 {
    200
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSection {
    /// Placeholder strings that count as "missing" (blank is always missing).
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            placeholders: default_placeholders(),
        }
    }
}

fn default_placeholders() -> Vec<String> {
    vec!["Not Found".into()]
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime Places client configuration.
#[derive(Debug, Clone)]
pub struct PlacesConfig {
    /// API key value (resolved from the environment).
    pub api_key: String,
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Fixed delay before every request.
    pub request_delay: Duration,
    /// Items per page, at most [`MAX_PAGE_SIZE`].
    pub page_size: u32,
}

impl PlacesConfig {
    /// Build from the config file section plus a resolved key.
    pub fn from_section(section: &PlacesSection, api_key: String) -> Self {
        Self {
            api_key,
            base_url: section.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(section.timeout_secs),
            request_delay: Duration::from_millis(section.request_delay_ms),
            page_size: section.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Runtime website fetch configuration.
#[derive(Debug, Clone)]
pub struct WebsiteConfig {
    /// Per-fetch timeout.
    pub timeout: Duration,
    /// Delay after every remote fetch.
    pub delay: Duration,
}

impl From<&AppConfig> for WebsiteConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.website.timeout_secs),
            delay: Duration::from_millis(config.website.delay_ms),
        }
    }
}

/// Runtime text-generation configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// API key value.
    pub api_key: String,
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Delay after every generation call.
    pub delay: Duration,
}

impl GenerationConfig {
    /// Build from the config file section, an optional model override, and a resolved key.
    pub fn from_section(section: &GenerationSection, model: Option<&str>, api_key: String) -> Self {
        Self {
            api_key,
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or(&section.default_model).to_string(),
            max_tokens: section.max_tokens,
            temperature: section.temperature,
            timeout: Duration::from_secs(section.timeout_secs),
            delay: Duration::from_millis(section.delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadenrich/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadEnrichError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadenrich/leadenrich.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadEnrichError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LeadEnrichError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadEnrichError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadEnrichError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadEnrichError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the named env var, failing when unset or empty.
pub fn read_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(LeadEnrichError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable \
             (a .env file in the working directory is also read)."
        ))),
    }
}
