//! Configuration parsing and validation for chatrelay.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub pacing: PacingConfig,
    pub completion: CompletionConfig,
    pub storage: Option<StorageConfig>,
    pub providers: Vec<ProviderConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// TCP connect timeout for upstream providers, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Output pacing for the re-chunker.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PacingConfig {
    /// Target outbound rate in characters per second
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: u32,
    /// Delay between two emitted slices, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_chars_per_second() -> u32 {
    2500
}

fn default_interval_ms() -> u64 {
    100
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            chars_per_second: default_chars_per_second(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Fixed sampling parameters sent with every upstream completion.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Remote blob store for user data. When absent, an in-memory store is used.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base URL of the blob API (e.g., "https://blob.vercel-storage.com")
    pub base_url: String,
    /// Read/write token for the blob API
    pub token: Option<ApiKey>,
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Provider configuration: one credentialed backend.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Unique name for this provider (e.g., "groq-2")
    pub name: String,
    /// Vendor family (e.g., "groq")
    pub vendor: String,
    /// Base URL of the OpenAI-compatible API
    pub url: String,
    /// Model identifier sent upstream
    pub model: String,
    /// API key; a provider without one is never called
    pub api_key: Option<ApiKey>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_env(path).map(|(config, _)| config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let (config, _) = Self::from_raw(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Validation(
                "Provider pool is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    provider.name
                )));
            }
            if provider.model.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty model",
                    provider.name
                )));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate provider name '{}'",
                    provider.name
                )));
            }
        }

        if self.pacing.chars_per_second == 0 {
            return Err(ConfigError::Validation(
                "pacing.chars_per_second must be greater than zero".to_string(),
            ));
        }
        if self.pacing.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "pacing.interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.providers.iter().all(|p| p.api_key.is_none()) {
            tracing::warn!("No provider has an API key - every chat request will fail");
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for '{owner}': {message}")]
    EnvVar {
        var: String,
        owner: String,
        message: String,
    },
}

/// Raw provider config deserialized directly from TOML.
/// api_key is `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProviderConfig {
    name: String,
    vendor: Option<String>,
    url: String,
    model: String,
    api_key: Option<String>,
}

/// Raw storage config; the token may contain `${VAR}` references.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStorageConfig {
    base_url: String,
    token: Option<String>,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    pacing: PacingConfig,
    #[serde(default)]
    completion: CompletionConfig,
    storage: Option<RawStorageConfig>,
    #[serde(default)]
    providers: Vec<RawProviderConfig>,
}

fn builtin(name: &str, vendor: &str, url: &str, model: &str) -> RawProviderConfig {
    RawProviderConfig {
        name: name.to_string(),
        vendor: Some(vendor.to_string()),
        url: url.to_string(),
        model: model.to_string(),
        api_key: None,
    }
}

/// The provider table used when the config file declares no providers.
///
/// Grouped by vendor; the order here is the rotation order. Keys come from
/// the convention variables (`CHATRELAY_DEEPSEEK_1_API_KEY`, ...).
pub fn builtin_providers() -> Vec<RawProviderConfig> {
    const DEEPSEEK: (&str, &str) = ("https://api.deepseek.com", "deepseek-chat");
    const GROQ: (&str, &str) = (
        "https://api.groq.com/openai/v1",
        "llama-3.3-70b-versatile",
    );
    const OPENROUTER: (&str, &str) = (
        "https://openrouter.ai/api/v1",
        "meta-llama/llama-3.1-8b-instruct:free",
    );
    const OPENAI: (&str, &str) = ("https://api.openai.com/v1", "gpt-4o-mini");

    let families: [(&str, usize, (&str, &str)); 4] = [
        ("deepseek", 2, DEEPSEEK),
        ("groq", 4, GROQ),
        ("openrouter", 3, OPENROUTER),
        ("openai", 3, OPENAI),
    ];

    families
        .iter()
        .flat_map(|(vendor, count, (url, model))| {
            (1..=*count).map(move |i| builtin(&format!("{}-{}", vendor, i), vendor, url, model))
        })
        .collect()
}

/// Derive a vendor family from a provider name: "groq-2" -> "groq".
fn vendor_from_name(name: &str) -> String {
    match name.rsplit_once('-') {
        Some((prefix, suffix)) if suffix.chars().all(|c| c.is_ascii_digit()) => prefix.to_string(),
        _ => name.to_string(),
    }
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, owner: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            owner: owner.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                owner: owner.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            owner: owner.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in '{}')",
                var_name, owner
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Expand all `${VAR}` references in a string using real environment variables.
fn expand_env_vars(input: &str, owner: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, owner, |name| std::env::var(name).ok())
}

/// Derive the convention-based env var name for a provider.
///
/// - "groq-1" -> "CHATRELAY_GROQ_1_API_KEY"
/// - "my service" -> "CHATRELAY_MY_SERVICE_API_KEY"
pub fn convention_env_var_name(provider_name: &str) -> String {
    let upper_snake = provider_name.to_uppercase().replace(['-', ' '], "_");
    format!("CHATRELAY_{}_API_KEY", upper_snake)
}

/// Returns `Some((var_name, value))` if `CHATRELAY_<NAME>_API_KEY` is set and non-empty.
fn convention_key_lookup(provider_name: &str) -> Option<(String, String)> {
    let var_name = convention_env_var_name(provider_name);
    std::env::var(&var_name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(|value| (var_name, value))
}

/// Resolve a raw key value into an `ApiKey` and record where it came from.
fn resolve_key(raw_key: Option<&str>, owner: &str) -> Result<(Option<ApiKey>, KeySource), ConfigError> {
    match raw_key {
        Some(raw) if raw.contains("${") => match expand_env_vars(raw, owner)? {
            expanded if expanded.is_empty() => Ok((None, KeySource::None)),
            expanded => Ok((Some(ApiKey::from(expanded)), KeySource::EnvExpanded)),
        },
        Some("") => Ok((None, KeySource::None)),
        Some(raw) => Ok((Some(ApiKey::from(raw)), KeySource::Literal)),
        None => match convention_key_lookup(owner) {
            Some((var_name, value)) => Ok((Some(ApiKey::from(value)), KeySource::Convention(var_name))),
            None => Ok((None, KeySource::None)),
        },
    }
}

impl Config {
    /// Convert raw (deserialized) config to final config with env var expansion.
    ///
    /// An empty provider list is replaced by [`builtin_providers`]. For each provider:
    /// - `${VAR}` in `api_key`: expanded from environment, source = `EnvExpanded`
    /// - literal `api_key`: wrapped directly, source = `Literal`
    /// - absent `api_key`: convention lookup (`CHATRELAY_<NAME>_API_KEY`)
    pub fn from_raw(raw: RawConfig) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let raw_providers = if raw.providers.is_empty() {
            builtin_providers()
        } else {
            raw.providers
        };

        let mut providers = Vec::with_capacity(raw_providers.len());
        let mut key_sources = Vec::with_capacity(raw_providers.len());

        for rp in raw_providers {
            let (api_key, source) = resolve_key(rp.api_key.as_deref(), &rp.name)?;
            key_sources.push((rp.name.clone(), source));

            let vendor = rp.vendor.unwrap_or_else(|| vendor_from_name(&rp.name));
            providers.push(ProviderConfig {
                name: rp.name,
                vendor,
                url: rp.url,
                model: rp.model,
                api_key,
            });
        }

        let storage = match raw.storage {
            Some(rs) => {
                let token = match rs.token.as_deref() {
                    Some(raw) if raw.contains("${") => Some(expand_env_vars(raw, "storage")?),
                    Some(raw) => Some(raw.to_string()),
                    None => None,
                }
                .filter(|token| !token.is_empty())
                .map(ApiKey::from);
                Some(StorageConfig {
                    base_url: rs.base_url,
                    token,
                })
            }
            None => None,
        };

        let config = Config {
            server: raw.server,
            pacing: raw.pacing,
            completion: raw.completion,
            storage,
            providers,
        };

        Ok((config, key_sources))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// Returns the config and per-provider key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        let raw: RawConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw)?;
        config.validate()?;

        Ok((config, key_sources))
    }

    /// Like [`Config::from_file_with_env`], but a missing file yields the
    /// defaults with the built-in provider table.
    pub fn load_or_default(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        if path.as_ref().exists() {
            return Self::from_file_with_env(path);
        }

        tracing::warn!(
            path = %path.as_ref().display(),
            "Config file not found, using built-in defaults"
        );
        let (config, key_sources) = Self::from_raw(RawConfig::default())?;
        config.validate()?;
        Ok((config, key_sources))
    }
}
