use std::collections::HashMap;

use crate::core::builtin_providers::{load_builtin_providers, ProviderDescriptor};
use crate::core::config::data::Config;
use crate::core::error::ConfigurationError;
use crate::core::json_path::parse_path;

/// Where provider credentials are read from.
pub trait CredentialSource {
    fn lookup(&self, env_name: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn lookup(&self, env_name: &str) -> Option<String> {
        self.get(env_name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Key(String),
    /// The provider takes no credential (e.g. a local server).
    Anonymous,
}

impl Credential {
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Credential::Key(key) => Some(key),
            Credential::Anonymous => None,
        }
    }
}

/// Resolve a provider's credential. `None` means the provider is not
/// configured: its variable is missing or blank.
pub fn resolve_credential(
    descriptor: &ProviderDescriptor,
    source: &dyn CredentialSource,
) -> Option<Credential> {
    if !descriptor.requires_credential() {
        return Some(Credential::Anonymous);
    }
    let env_name = descriptor.env_name.as_deref()?;
    source
        .lookup(env_name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(Credential::Key)
}

/// Every provider known to this process: built-ins overlaid with the user's
/// configured providers (same id replaces, new ids append).
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderDescriptor>) -> Self {
        Self { providers }
    }

    pub fn builtin() -> Self {
        Self::new(load_builtin_providers())
    }

    pub fn with_custom(mut self, custom: &[ProviderDescriptor]) -> Self {
        for provider in custom {
            match self
                .providers
                .iter_mut()
                .find(|existing| existing.id.eq_ignore_ascii_case(&provider.id))
            {
                Some(existing) => *existing = provider.clone(),
                None => self.providers.push(provider.clone()),
            }
        }
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::builtin().with_custom(&config.providers)
    }

    pub fn find(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|provider| provider.id.eq_ignore_ascii_case(id))
    }

    pub fn require(&self, id: &str) -> Result<&ProviderDescriptor, ConfigurationError> {
        self.find(id)
            .ok_or_else(|| ConfigurationError::UnknownProvider(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Reject descriptors whose model-list path can never match anything.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for provider in &self.providers {
            parse_path(&provider.models.json_path).map_err(|_| {
                ConfigurationError::InvalidJsonPath {
                    provider: provider.id.clone(),
                    path: provider.models.json_path.clone(),
                }
            })?;
        }
        Ok(())
    }

    /// `(id, display name, has credential)` for every provider.
    pub fn auth_status(&self, source: &dyn CredentialSource) -> Vec<(String, String, bool)> {
        self.providers
            .iter()
            .map(|provider| {
                (
                    provider.id.clone(),
                    provider.display_name().to_string(),
                    resolve_credential(provider, source).is_some(),
                )
            })
            .collect()
    }
}

/// A provider resolved for chat: the endpoint to talk to and the key to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientBinding {
    pub provider_id: String,
    pub provider_display_name: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ClientBinding {
    /// Bind a provider for chat. A missing credential is a hard error here,
    /// unlike discovery where the provider is skipped.
    pub fn bind(
        descriptor: &ProviderDescriptor,
        source: &dyn CredentialSource,
        base_url_choice: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let credential = resolve_credential(descriptor, source).ok_or_else(|| {
            ConfigurationError::MissingCredential {
                provider: descriptor.id.clone(),
                env_name: descriptor.env_name.clone().unwrap_or_default(),
            }
        })?;

        let base_url = match base_url_choice.filter(|choice| !choice.is_empty()) {
            Some(choice) if descriptor.base_url.contains(choice) => choice.to_string(),
            Some(choice) => {
                return Err(ConfigurationError::InvalidBaseUrlChoice {
                    provider: descriptor.id.clone(),
                    base_url: choice.to_string(),
                })
            }
            None => descriptor
                .base_url
                .primary()
                .map(str::to_string)
                .ok_or_else(|| ConfigurationError::InvalidBaseUrlChoice {
                    provider: descriptor.id.clone(),
                    base_url: String::new(),
                })?,
        };

        Ok(ClientBinding {
            provider_id: descriptor.id.to_lowercase(),
            provider_display_name: descriptor.display_name().to_string(),
            base_url,
            api_key: credential.api_key().map(str::to_string),
        })
    }
}
