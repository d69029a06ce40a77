use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::builtin_providers::ProviderDescriptor;
use crate::core::capability::CapabilityRuleConfig;
use crate::core::constants::{DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_SYSTEM_PROMPT};

pub const ENV_DEFAULT_PROVIDER: &str = "PARLEY_DEFAULT_PROVIDER";
pub const ENV_DEFAULT_MODEL: &str = "PARLEY_DEFAULT_MODEL";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    /// Endpoint picked for providers that offer regional alternatives
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    /// User-defined providers; an id matching a built-in replaces it
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderDescriptor>,
    /// Ordered delivery-mode rules; replaces the default table when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_rules: Vec<CapabilityRuleConfig>,
}

impl Config {
    pub fn provider(&self) -> &str {
        self.default_provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Environment variables take precedence over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(provider) = non_empty(ENV_DEFAULT_PROVIDER) {
            self.default_provider = Some(provider);
        }
        if let Some(model) = non_empty(ENV_DEFAULT_MODEL) {
            self.default_model = Some(model);
        }
    }

    /// Switch the default provider, dropping a region that belongs to the
    /// previous one.
    pub fn set_provider(&mut self, provider: &str) {
        if !self.provider().eq_ignore_ascii_case(provider) {
            self.base_url = None;
        }
        self.default_provider = Some(provider.to_string());
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
