//! `parley set` / `parley unset`

use std::fmt;

use crate::core::config::data::Config;
use crate::core::providers::ProviderRegistry;

pub const SETTING_KEYS: &[&str] = &[
    "default-provider",
    "default-model",
    "base-url",
    "system-prompt",
];

#[derive(Debug, PartialEq, Eq)]
pub enum SettingError {
    UnknownKey(String),
    UnknownProvider(String),
    /// The endpoint is not one the current provider declares.
    UnknownBaseUrl { provider: String, base_url: String },
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    ConfigError(String),
}

impl SettingError {
    pub fn print(&self) {
        match self {
            SettingError::MissingArgs { hint, example } => {
                eprintln!("⚠️  {hint}");
                eprintln!("Example: {example}");
            }
            other => eprintln!("❌ {other}"),
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(
                f,
                "Unknown config key: {key} (expected one of: {})",
                SETTING_KEYS.join(", ")
            ),
            SettingError::UnknownProvider(input) => write!(
                f,
                "Unknown provider: {input}. Run 'parley -p' to list available providers."
            ),
            SettingError::UnknownBaseUrl { provider, base_url } => write!(
                f,
                "'{base_url}' is not an endpoint of provider '{provider}'"
            ),
            SettingError::MissingArgs { hint, .. } => write!(f, "{hint}"),
            SettingError::ConfigError(msg) => write!(f, "Failed to save configuration: {msg}"),
        }
    }
}

impl std::error::Error for SettingError {}

/// Apply `set <key> <value...>` to `config`, returning the confirmation line.
pub fn apply_set(
    config: &mut Config,
    registry: &ProviderRegistry,
    key: &str,
    value: &[String],
) -> Result<String, SettingError> {
    let value = value.join(" ");
    let value = value.trim();

    match key {
        "default-provider" => {
            if value.is_empty() {
                return Err(SettingError::MissingArgs {
                    hint: "To set a default provider, specify the provider:",
                    example: "parley set default-provider groq",
                });
            }
            let provider = registry
                .find(value)
                .ok_or_else(|| SettingError::UnknownProvider(value.to_string()))?;
            let id = provider.id.to_lowercase();
            config.set_provider(&id);
            Ok(format!("✅ Set default-provider to: {id}"))
        }
        "default-model" => {
            if value.is_empty() {
                return Err(SettingError::MissingArgs {
                    hint: "To set a default model, specify the model:",
                    example: "parley set default-model gpt-4.1-mini",
                });
            }
            config.default_model = Some(value.to_string());
            Ok(format!("✅ Set default-model to: {value}"))
        }
        "base-url" => {
            if value.is_empty() {
                return Err(SettingError::MissingArgs {
                    hint: "To pick a regional endpoint, specify its URL:",
                    example: "parley set base-url https://bedrock-runtime.eu-west-1.amazonaws.com/openai/v1",
                });
            }
            let provider_id = config.provider().to_string();
            let provider = registry
                .find(&provider_id)
                .ok_or_else(|| SettingError::UnknownProvider(provider_id.clone()))?;
            if !provider.base_url.contains(value) {
                return Err(SettingError::UnknownBaseUrl {
                    provider: provider_id,
                    base_url: value.to_string(),
                });
            }
            config.base_url = Some(value.to_string());
            Ok(format!("✅ Set base-url to: {value}"))
        }
        "system-prompt" => {
            if value.is_empty() {
                return Err(SettingError::MissingArgs {
                    hint: "To set a system prompt, give its text:",
                    example: "parley set system-prompt You are a terse assistant.",
                });
            }
            config.system_prompt = Some(value.to_string());
            Ok("✅ Set system-prompt".to_string())
        }
        other => Err(SettingError::UnknownKey(other.to_string())),
    }
}

pub fn apply_unset(config: &mut Config, key: &str) -> Result<String, SettingError> {
    match key {
        "default-provider" => {
            config.default_provider = None;
            config.base_url = None;
        }
        "default-model" => config.default_model = None,
        "base-url" => config.base_url = None,
        "system-prompt" => config.system_prompt = None,
        other => return Err(SettingError::UnknownKey(other.to_string())),
    }
    Ok(format!("✅ Unset {key}"))
}

fn persist(config: &Config, message: String) -> Result<String, SettingError> {
    config
        .save()
        .map_err(|err| SettingError::ConfigError(err.to_string()))?;
    Ok(message)
}

/// Load, change and save the user's config. With no value, prints the
/// current configuration instead.
pub fn run_set(key: &str, value: &[String]) -> Result<(), SettingError> {
    let mut config = load_for_update()?;
    if value.is_empty() && SETTING_KEYS.contains(&key) {
        config.print_all();
        return Ok(());
    }
    let registry = ProviderRegistry::from_config(&config);
    let message = apply_set(&mut config, &registry, key, value)?;
    println!("{}", persist(&config, message)?);
    Ok(())
}

pub fn run_unset(key: &str) -> Result<(), SettingError> {
    let mut config = load_for_update()?;
    let message = apply_unset(&mut config, key)?;
    println!("{}", persist(&config, message)?);
    Ok(())
}

/// The file as written, without environment overrides, so they are never
/// persisted by accident.
fn load_for_update() -> Result<Config, SettingError> {
    let path = Config::get_config_path().map_err(|err| SettingError::ConfigError(err.to_string()))?;
    Config::load_from_path(&path).map_err(|err| SettingError::ConfigError(err.to_string()))
}
