//! Built-in provider configuration
//!
//! Provider descriptors are embedded from `builtin_providers.toml` at build
//! time. User configuration can extend or override them (see
//! [`crate::core::providers::ProviderRegistry`]).

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How the model-listing endpoint expects the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Bearer <key>`
    #[default]
    OpenAi,
    /// `x-api-key` with an `anthropic-version` header
    Anthropic,
    /// `?key=<key>` query parameter
    Google,
    /// No credential is sent
    None,
}

/// A single endpoint or a set of regional alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseUrl {
    Single(String),
    Multi(Vec<String>),
}

impl BaseUrl {
    pub fn urls(&self) -> Vec<&str> {
        match self {
            BaseUrl::Single(url) if url.is_empty() => Vec::new(),
            BaseUrl::Single(url) => vec![url.as_str()],
            BaseUrl::Multi(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, BaseUrl::Multi(urls) if !urls.is_empty())
    }

    /// The endpoint used when the caller has not picked one.
    pub fn primary(&self) -> Option<&str> {
        self.urls().first().copied()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls().iter().any(|candidate| *candidate == url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListEndpoint {
    pub url: String,
    /// Dotted path such as `data.id`: the leading segments walk objects down
    /// to an array, the last one names the field read from each element.
    pub json_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Environment variable holding the credential. Absent means none is needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_name: Option<String>,
    pub base_url: BaseUrl,
    #[serde(default)]
    pub auth: AuthMode,
    pub models: ModelListEndpoint,
}

impl ProviderDescriptor {
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }

    pub fn requires_credential(&self) -> bool {
        self.env_name.is_some() && self.auth != AuthMode::None
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<ProviderDescriptor>,
}

static BUILTIN_PROVIDERS: LazyLock<Vec<ProviderDescriptor>> = LazyLock::new(|| {
    const CONFIG_CONTENT: &str = include_str!("../builtin_providers.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_providers.toml");

    config.providers
});

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> Vec<ProviderDescriptor> {
    BUILTIN_PROVIDERS.clone()
}

/// Find a built-in provider by ID (case-insensitive)
pub fn find_builtin_provider(id: &str) -> Option<ProviderDescriptor> {
    BUILTIN_PROVIDERS
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(id))
        .cloned()
}
