use std::error::Error;
use std::fmt;

/// Problems detected before any request is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    UnknownProvider(String),
    MissingCredential { provider: String, env_name: String },
    InvalidJsonPath { provider: String, path: String },
    InvalidRule { rule: String, reason: String },
    InvalidBaseUrlChoice { provider: String, base_url: String },
}

impl ConfigurationError {
    /// Exit status used by the CLI when this error ends the process.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::UnknownProvider(provider) => {
                write!(f, "Unknown provider '{provider}'. Run 'parley -p' to list providers.")
            }
            ConfigurationError::MissingCredential { provider, env_name } => write!(
                f,
                "No credential for provider '{provider}'. Set it with:\n   export {env_name}=\"your-api-key-here\""
            ),
            ConfigurationError::InvalidJsonPath { provider, path } => write!(
                f,
                "Provider '{provider}' declares an unusable model-list JSON path '{path}'"
            ),
            ConfigurationError::InvalidRule { rule, reason } => {
                write!(f, "Invalid capability rule '{rule}': {reason}")
            }
            ConfigurationError::InvalidBaseUrlChoice { provider, base_url } => write!(
                f,
                "'{base_url}' is not one of the endpoints declared for provider '{provider}'"
            ),
        }
    }
}

impl Error for ConfigurationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_names_the_variable() {
        let err = ConfigurationError::MissingCredential {
            provider: "groq".to_string(),
            env_name: "GROQ_API_KEY".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("'groq'"));
        assert!(text.contains("export GROQ_API_KEY="));
        assert_eq!(err.exit_code(), 2);
    }
}
