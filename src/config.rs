//! Configuration for the chat endpoint: where to send requests, which headers to
//! attach, and the default request parameters every hop carries.

use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Environment variable overriding the chat-completions endpoint
pub const ENV_ENDPOINT: &str = "SEARCH_CHAT_ENDPOINT";
/// Environment variable naming a [`Provider`] shortcut
pub const ENV_PROVIDER: &str = "SEARCH_CHAT_PROVIDER";
/// Environment variable holding the bearer token
pub const ENV_API_KEY: &str = "SEARCH_CHAT_API_KEY";
/// Environment variable overriding the model
pub const ENV_MODEL: &str = "SEARCH_CHAT_MODEL";
/// Environment variable overriding the sampling temperature
pub const ENV_TEMPERATURE: &str = "SEARCH_CHAT_TEMPERATURE";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Supported provider shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    OpenAI,
    LMStudio,
    Ollama,
}

impl Provider {
    /// Get the default chat-completions endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            Provider::OpenAI => "https://api.openai.com/v1/chat/completions",
            Provider::LMStudio => "http://localhost:1234/v1/chat/completions",
            Provider::Ollama => "http://localhost:11434/v1/chat/completions",
        }
    }

    /// Parse a provider from its name
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openrouter" | "open-router" => Some(Provider::OpenRouter),
            "openai" => Some(Provider::OpenAI),
            "lmstudio" | "lm-studio" | "lm_studio" => Some(Provider::LMStudio),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }
}

/// Request parameters serialized into every request body next to `messages`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Always true; the decoder only understands streamed responses.
    pub stream: bool,
}

impl RequestConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            stream: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Everything needed to talk to the chat endpoint.
#[derive(Clone)]
pub struct ApiConfig {
    /// Full chat-completions URL requests are POSTed to
    pub endpoint: String,

    /// Headers attached to both hops, including authorization
    pub headers: BTreeMap<String, String>,

    /// Parameters flattened into each request body
    pub request: RequestConfig,

    /// Limit on establishing the connection; streaming itself is unbounded
    pub connect_timeout: Option<Duration>,

    /// Deadline for a whole turn, enforced through the turn's cancellation token
    pub turn_timeout: Option<Duration>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), "***")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("ApiConfig")
            .field("endpoint", &self.endpoint)
            .field("headers", &headers)
            .field("request", &self.request)
            .field("connect_timeout", &self.connect_timeout)
            .field("turn_timeout", &self.turn_timeout)
            .finish()
    }
}

impl ApiConfig {
    /// Creates a new builder
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }

    /// Loads configuration from the process environment.
    ///
    /// See [`ApiConfig::from_vars`] for the precedence rules.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Loads configuration from a variable lookup.
    ///
    /// Endpoint priority: `SEARCH_CHAT_ENDPOINT`, then the default of
    /// `SEARCH_CHAT_PROVIDER`, then OpenRouter. The model falls back to
    /// [`DEFAULT_MODEL`].
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup(ENV_PROVIDER) {
            Some(name) => Some(
                Provider::from_name(&name)
                    .ok_or_else(|| Error::config(format!("unknown provider '{}'", name)))?,
            ),
            None => None,
        };

        let endpoint = lookup(ENV_ENDPOINT).unwrap_or_else(|| {
            provider
                .unwrap_or(Provider::OpenRouter)
                .default_endpoint()
                .to_string()
        });

        let mut builder = ApiConfig::builder()
            .endpoint(endpoint)
            .model(lookup(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()));

        if let Some(key) = lookup(ENV_API_KEY) {
            builder = builder.api_key(key);
        }

        if let Some(raw) = lookup(ENV_TEMPERATURE) {
            let temperature = raw
                .trim()
                .parse::<f32>()
                .map_err(|e| Error::config(format!("invalid temperature '{}': {}", raw, e)))?;
            builder = builder.temperature(temperature);
        }

        builder.build()
    }
}

/// Builder for [`ApiConfig`]
#[derive(Debug, Default)]
pub struct ApiConfigBuilder {
    endpoint: Option<String>,
    headers: BTreeMap<String, String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    connect_timeout: Option<Duration>,
    turn_timeout: Option<Duration>,
}

impl ApiConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the `Authorization: Bearer <key>` header
    pub fn api_key(self, key: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", key.as_ref());
        self.header("Authorization", value)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// Fails when the endpoint or model is missing or the endpoint is not an
    /// http(s) URL.
    pub fn build(self) -> Result<ApiConfig> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| Error::config("endpoint is required"))?;

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::config(format!(
                "endpoint must start with http:// or https://, got '{}'",
                endpoint
            )));
        }

        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| Error::config("model is required"))?;

        let mut request = RequestConfig::new(model);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        Ok(ApiConfig {
            endpoint,
            headers: self.headers,
            request,
            connect_timeout: self.connect_timeout.or(Some(Duration::from_secs(30))),
            turn_timeout: self.turn_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_provider_default_endpoints() {
        assert_eq!(
            Provider::OpenRouter.default_endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            Provider::Ollama.default_endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_provider_from_name() {
        assert_eq!(Provider::from_name("OpenRouter"), Some(Provider::OpenRouter));
        assert_eq!(Provider::from_name("lm-studio"), Some(Provider::LMStudio));
        assert_eq!(Provider::from_name("ollama"), Some(Provider::Ollama));
        assert_eq!(Provider::from_name("unknown"), None);
    }

    #[test]
    fn test_builder_requires_endpoint_and_model() {
        let err = ApiConfig::builder().model("m").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ApiConfig::builder()
            .endpoint("http://localhost:1234/v1/chat/completions")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_rejects_non_http_endpoint() {
        let err = ApiConfig::builder()
            .endpoint("localhost:1234")
            .model("m")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_builder_collects_request_config() {
        let config = ApiConfig::builder()
            .endpoint("http://localhost:1234/v1/chat/completions")
            .model("test-model")
            .temperature(0.9)
            .max_tokens(256)
            .api_key("secret")
            .header("HTTP-Referer", "https://example.com")
            .build()
            .unwrap();

        assert_eq!(config.request.model, "test-model");
        assert_eq!(config.request.temperature, Some(0.9));
        assert_eq!(config.request.max_tokens, Some(256));
        assert!(config.request.stream);
        assert_eq!(config.headers["Authorization"], "Bearer secret");
        assert_eq!(config.headers["HTTP-Referer"], "https://example.com");
    }

    #[test]
    fn test_debug_redacts_authorization() {
        let config = ApiConfig::builder()
            .endpoint("http://localhost:1234/v1/chat/completions")
            .model("m")
            .api_key("super-secret")
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = ApiConfig::from_vars(lookup_from(&[])).unwrap();
        assert_eq!(config.endpoint, Provider::OpenRouter.default_endpoint());
        assert_eq!(config.request.model, DEFAULT_MODEL);
        assert!(!config.headers.contains_key("Authorization"));
    }

    #[test]
    fn test_from_vars_endpoint_beats_provider() {
        let config = ApiConfig::from_vars(lookup_from(&[
            (ENV_PROVIDER, "ollama"),
            (ENV_ENDPOINT, "http://custom:8080/v1/chat/completions"),
            (ENV_MODEL, "qwen3:8b"),
            (ENV_API_KEY, "k"),
            (ENV_TEMPERATURE, "0.25"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://custom:8080/v1/chat/completions");
        assert_eq!(config.request.model, "qwen3:8b");
        assert_eq!(config.request.temperature, Some(0.25));
        assert_eq!(config.headers["Authorization"], "Bearer k");
    }

    #[test]
    fn test_from_vars_provider_default() {
        let config = ApiConfig::from_vars(lookup_from(&[(ENV_PROVIDER, "lmstudio")])).unwrap();
        assert_eq!(config.endpoint, Provider::LMStudio.default_endpoint());
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        let err = ApiConfig::from_vars(lookup_from(&[(ENV_PROVIDER, "nope")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err =
            ApiConfig::from_vars(lookup_from(&[(ENV_TEMPERATURE, "warm")])).unwrap_err();
        assert!(err.to_string().contains("invalid temperature"));
    }
}
