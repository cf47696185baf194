use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ShoppingError};
use crate::gateway::ToolDefinition;
use crate::tools::ToolRegistry;

/// Main configuration for the shopping guide service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7860
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Static declaration of the remote assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_assistant_instructions")]
    pub instructions: String,
    #[serde(default = "default_assistant_model")]
    pub model: String,
    /// Supplementary instructions attached to every run
    #[serde(default = "default_run_instructions")]
    pub run_instructions: String,
    /// Tool schemas declared to the assistant, checked against the executor at startup
    #[serde(default = "default_assistant_tools")]
    pub tools: Vec<ToolDefinition>,
}

fn default_assistant_name() -> String {
    "Shopping Guide".to_string()
}

fn default_assistant_instructions() -> String {
    "As a Shopping Guide, you assist users in making informed purchasing decisions. \
     You ask about their preferences, budget, and the type of product they are looking for, \
     offering options that best match their criteria. You provide comparisons between products, \
     highlighting features, advantages, and disadvantages. You are knowledgeable about a wide \
     range of products and provide guidance on choosing the best option according to the user's \
     needs. You maintain a friendly and helpful tone, ensuring the user feels supported throughout \
     their decision-making process. Avoid suggesting products outside the user's budget or \
     preferences. Instead, focus on finding the best fit within their specified parameters."
        .to_string()
}

fn default_assistant_model() -> String {
    "gpt-4-1106-preview".to_string()
}

fn default_run_instructions() -> String {
    "The user needs help making a purchase decision.".to_string()
}

fn default_assistant_tools() -> Vec<ToolDefinition> {
    ToolRegistry::new().definitions()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            instructions: default_assistant_instructions(),
            model: default_assistant_model(),
            run_instructions: default_run_instructions(),
            tools: default_assistant_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    /// Name of the env var holding the gateway credential
    #[serde(default = "default_gateway_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_gateway_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_gateway_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_http_timeout_secs() -> u64 {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            api_key_env: default_gateway_key_env(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_engine")]
    pub engine: String,
    /// Google country code sent as `gl`
    #[serde(default = "default_search_region")]
    pub region: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_search_base_url() -> String {
    "https://serpapi.com/search.json".to_string()
}

fn default_search_engine() -> String {
    "google_shopping".to_string()
}

fn default_search_region() -> String {
    "CH".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_search_key_env() -> String {
    "SERPAPI".to_string()
}

fn default_search_timeout_secs() -> u64 {
    20
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            engine: default_search_engine(),
            region: default_search_region(),
            max_results: default_max_results(),
            api_key_env: default_search_key_env(),
            http_timeout_secs: default_search_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_vision_max_tokens")]
    pub max_tokens: u32,
}

fn default_vision_model() -> String {
    "gpt-4-vision-preview".to_string()
}

fn default_vision_max_tokens() -> u32 {
    300
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: default_vision_model(),
            max_tokens: default_vision_max_tokens(),
        }
    }
}

/// Run polling schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_initial_interval_ms() -> u64 {
    500
}

fn default_max_interval_ms() -> u64 {
    4_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    120
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl SearchConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(ShoppingError::Config(format!(
                "Configuration file not found: {}",
                path
            )));
        }

        let content = substitute_env_vars(&fs::read_to_string(path)?);

        let path_lower = path.to_lowercase();
        let config = if path_lower.ends_with(".jsonld") || path_lower.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| ShoppingError::Config(format!("{}: {}", path, e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| ShoppingError::Config(format!("{}: {}", path, e)))?
        };
        Ok(config)
    }

    /// Load the first candidate that exists. Built-in defaults are used only
    /// when none of them exist; a file that exists but fails to load is an error.
    pub fn discover(candidates: &[String]) -> Result<(Self, Option<String>)> {
        for path in candidates {
            if !Path::new(path).exists() {
                tracing::debug!("No config at {}", path);
                continue;
            }
            return Ok((Self::load(path)?, Some(path.clone())));
        }
        Ok((Self::default(), None))
    }
}

/// Replace `${VAR_NAME}` with the value of the environment variable, leaving
/// unknown variables untouched
pub fn substitute_env_vars(content: &str) -> String {
    let pattern = match Regex::new(r"\$\{(\w+)\}") {
        Ok(p) => p,
        Err(_) => return content.to_string(),
    };
    pattern
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Credentials read from the environment at startup
#[derive(Clone)]
pub struct Credentials {
    pub gateway_api_key: String,
    pub search_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gateway_api_key", &"<redacted>")
            .field("search_api_key", &self.search_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// The gateway key is mandatory; the search key only degrades the search tool
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gateway_api_key = lookup(&config.gateway.api_key_env)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ShoppingError::Config(format!(
                    "API key for the assistant gateway not found: set {}",
                    config.gateway.api_key_env
                ))
            })?;

        let search_api_key = lookup(&config.search.api_key_env).filter(|k| !k.trim().is_empty());
        if search_api_key.is_none() {
            tracing::warn!(
                "{} is not set; product search will return no results",
                config.search.api_key_env
            );
        }

        Ok(Self {
            gateway_api_key,
            search_api_key,
        })
    }
}
