use std::fmt;
use std::str::FromStr;

use tracing::debug;

pub const DEFAULT_PATH: &str = "/api/ai-gateway";
pub const DEFAULT_BIND: &str = "127.0.0.1:3001";

pub const CHAT_COMPLETIONS_URL: &str = "https://ai-gateway.vercel.sh/v1/chat/completions";
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const OIDC_TOKEN_ENV: &str = "VERCEL_OIDC_TOKEN";
pub const GATEWAY_KEY_ENV: &str = "AI_GATEWAY_API_KEY";
pub const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const UPSTREAM_URL_ENV: &str = "ZWICKY_UPSTREAM_URL";

/// Which upstream API the gateway talks to. Decides the auth headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpstreamFlavor {
    /// OpenAI-compatible chat completions, `Authorization: Bearer`.
    #[default]
    ChatCompletions,
    /// Anthropic messages, `x-api-key` plus `anthropic-version`.
    AnthropicMessages,
}

impl UpstreamFlavor {
    pub fn default_upstream(self) -> &'static str {
        match self {
            Self::ChatCompletions => CHAT_COMPLETIONS_URL,
            Self::AnthropicMessages => ANTHROPIC_MESSAGES_URL,
        }
    }

    /// Env var consulted when `VERCEL_OIDC_TOKEN` is unset.
    pub fn key_env(self) -> &'static str {
        match self {
            Self::ChatCompletions => GATEWAY_KEY_ENV,
            Self::AnthropicMessages => ANTHROPIC_KEY_ENV,
        }
    }

    pub fn missing_credential_hint(self) -> String {
        match self {
            Self::ChatCompletions => format!(
                "Set {GATEWAY_KEY_ENV} or {OIDC_TOKEN_ENV} in the gateway environment"
            ),
            Self::AnthropicMessages => {
                format!("Set {ANTHROPIC_KEY_ENV} in the gateway environment")
            }
        }
    }
}

impl fmt::Display for UpstreamFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatCompletions => write!(f, "chat-completions"),
            Self::AnthropicMessages => write!(f, "anthropic-messages"),
        }
    }
}

impl FromStr for UpstreamFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat-completions" | "chat" | "openai" => Ok(Self::ChatCompletions),
            "anthropic-messages" | "anthropic" | "messages" => Ok(Self::AnthropicMessages),
            other => Err(format!(
                "unknown upstream flavor '{other}' (expected chat-completions or anthropic-messages)"
            )),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub upstream_url: String,
    pub credential: Option<String>,
    pub flavor: UpstreamFlavor,
    pub path: String,
}

// Keeps the credential out of logs.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("upstream_url", &self.upstream_url)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("flavor", &self.flavor)
            .field("path", &self.path)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(flavor: UpstreamFlavor) -> Self {
        Self {
            upstream_url: flavor.default_upstream().to_string(),
            credential: None,
            flavor,
            path: DEFAULT_PATH.to_string(),
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Reads a local `.env` if there is one, then the process environment.
    pub fn from_env(flavor: UpstreamFlavor) -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!(error = %e, "no .env loaded");
        }
        Self::from_lookup(flavor, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(flavor: UpstreamFlavor, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::new(flavor);
        config.credential = present(OIDC_TOKEN_ENV).or_else(|| present(flavor.key_env()));
        if let Some(url) = present(UPSTREAM_URL_ENV) {
            config.upstream_url = url;
        }
        config
    }
}
