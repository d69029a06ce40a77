//! Model discovery across every configured provider.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::api::models::{fetch_provider_models, ModelListError};
use crate::core::constants::DISCOVERY_SEPARATOR;
use crate::core::providers::{resolve_credential, CredentialSource, ProviderRegistry};

/// One model offered by one provider, displayed as `provider|model`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryResult {
    pub provider: String,
    pub model: String,
}

impl DiscoveryResult {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Split a `provider|model` selection. The model part may itself contain
    /// the separator; only the first one splits.
    pub fn parse(selection: &str) -> Option<Self> {
        let (provider, model) = selection.trim().split_once(DISCOVERY_SEPARATOR)?;
        let (provider, model) = (provider.trim(), model.trim());
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self::new(provider, model))
    }
}

impl fmt::Display for DiscoveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.provider.replace(' ', "-"),
            DISCOVERY_SEPARATOR,
            self.model
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    NoModels,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NoModels => write!(f, "no models found from any provider"),
        }
    }
}

impl Error for DiscoveryError {}

/// Why one provider contributed nothing. Logged, never returned.
#[derive(Debug)]
enum ProviderFetchError {
    Timeout,
    Listing(ModelListError),
}

impl fmt::Display for ProviderFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFetchError::Timeout => write!(f, "timed out"),
            ProviderFetchError::Listing(err) => write!(f, "{err}"),
        }
    }
}

/// Query every provider in `registry` concurrently and merge their models.
///
/// Providers without a credential are skipped before any task starts. Each
/// task is bounded by `timeout`; a failing task contributes nothing and does
/// not affect the others. All tasks finish before the merge, so the result is
/// complete for this call. Fails only when the merged list is empty.
pub async fn discover_all(
    client: &reqwest::Client,
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
    timeout: Duration,
) -> Result<Vec<DiscoveryResult>, DiscoveryError> {
    let mut tasks = JoinSet::new();

    for provider in registry.iter() {
        let Some(credential) = resolve_credential(provider, credentials) else {
            debug!(provider = %provider.id, "skipping provider without credential");
            continue;
        };

        let client = client.clone();
        let provider = provider.clone();
        tasks.spawn(async move {
            let fetch = fetch_provider_models(&client, &provider, &credential, timeout);
            let outcome = match tokio::time::timeout(timeout, fetch).await {
                Ok(Ok(models)) => Ok(models),
                Ok(Err(ModelListError::Http(err))) if err.is_timeout() => {
                    Err(ProviderFetchError::Timeout)
                }
                Ok(Err(err)) => Err(ProviderFetchError::Listing(err)),
                Err(_) => Err(ProviderFetchError::Timeout),
            };
            (provider.id, outcome)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (provider_id, outcome) = match joined {
            Ok(pair) => pair,
            Err(err) => {
                warn!("model discovery task failed: {err}");
                continue;
            }
        };

        match outcome {
            Ok(models) => {
                debug!(provider = %provider_id, count = models.len(), "discovered models");
                results.extend(
                    models
                        .into_iter()
                        .map(|model| DiscoveryResult::new(provider_id.as_str(), model)),
                );
            }
            Err(err) => warn!(provider = %provider_id, "model discovery failed: {err}"),
        }
    }

    if results.is_empty() {
        return Err(DiscoveryError::NoModels);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builtin_providers::{
        AuthMode, BaseUrl, ModelListEndpoint, ProviderDescriptor,
    };
    use crate::utils::test_utils::{spawn_mock_server, test_client, MockResponse};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Instant;

    fn provider(id: &str, env_name: &str, models_url: String) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            display_name: String::new(),
            env_name: Some(env_name.to_string()),
            base_url: BaseUrl::Single(format!("https://{id}.example/v1")),
            auth: AuthMode::OpenAi,
            models: ModelListEndpoint {
                url: models_url,
                json_path: "data.id".to_string(),
            },
        }
    }

    fn credentials(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sorted(results: Vec<DiscoveryResult>) -> Vec<String> {
        let mut lines: Vec<String> = results.iter().map(ToString::to_string).collect();
        lines.sort();
        lines
    }

    #[test]
    fn display_and_parse_use_pipe_separator() {
        let result = DiscoveryResult::new("groq", "llama-70b");
        assert_eq!(result.to_string(), "groq|llama-70b");
        assert_eq!(DiscoveryResult::parse("groq|llama-70b"), Some(result));

        assert_eq!(
            DiscoveryResult::new("My Provider", "m").to_string(),
            "My-Provider|m"
        );
        assert_eq!(
            DiscoveryResult::parse("openrouter|a|b"),
            Some(DiscoveryResult::new("openrouter", "a|b"))
        );
        assert_eq!(DiscoveryResult::parse("no-separator"), None);
        assert_eq!(DiscoveryResult::parse("|model"), None);
    }

    #[tokio::test]
    async fn providers_without_credentials_are_skipped() {
        let groq = spawn_mock_server(vec![MockResponse::json(
            200,
            json!({"data": [{"id": "llama-70b"}]}),
        )])
        .await;
        let openai = spawn_mock_server(vec![MockResponse::json(
            200,
            json!({"data": [{"id": "gpt-4.1"}]}),
        )])
        .await;

        let registry = ProviderRegistry::new(vec![
            provider("openai", "OPENAI_API_KEY", openai.url("models")),
            provider("groq", "GROQ_API_KEY", groq.url("models")),
        ]);
        let creds = credentials(&[("GROQ_API_KEY", "gsk-test")]);

        let results = discover_all(&test_client(), &registry, &creds, Duration::from_secs(5))
            .await
            .expect("groq models should be found");

        assert_eq!(sorted(results), vec!["groq|llama-70b"]);
        assert!(openai.captured().await.is_empty());

        let requests = groq.captured().await;
        assert_eq!(requests[0].header("authorization"), Some("Bearer gsk-test"));
    }

    #[tokio::test]
    async fn failing_and_slow_providers_do_not_block_the_rest() {
        let good = spawn_mock_server(vec![MockResponse::json(
            200,
            json!({"data": [{"id": "a"}, {"id": "b"}]}),
        )])
        .await;
        let slow = spawn_mock_server(vec![MockResponse::hang()]).await;
        let broken = spawn_mock_server(vec![MockResponse::text(500, "upstream down")]).await;
        let malformed = spawn_mock_server(vec![MockResponse::text(200, "not json")]).await;

        let registry = ProviderRegistry::new(vec![
            provider("good", "GOOD_KEY", good.url("models")),
            provider("slow", "SLOW_KEY", slow.url("models")),
            provider("broken", "BROKEN_KEY", broken.url("models")),
            provider("malformed", "MALFORMED_KEY", malformed.url("models")),
            provider("unset", "UNSET_KEY", good.url("models")),
        ]);
        let creds = credentials(&[
            ("GOOD_KEY", "1"),
            ("SLOW_KEY", "2"),
            ("BROKEN_KEY", "3"),
            ("MALFORMED_KEY", "4"),
        ]);

        let started = Instant::now();
        let results = discover_all(
            &test_client(),
            &registry,
            &creds,
            Duration::from_millis(300),
        )
        .await
        .expect("the responding provider should contribute");

        assert_eq!(sorted(results), vec!["good|a", "good|b"]);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(slow.captured().await.len(), 1);
    }

    #[tokio::test]
    async fn no_models_anywhere_is_an_error() {
        let empty = spawn_mock_server(vec![MockResponse::json(200, json!({"data": []}))]).await;
        let broken = spawn_mock_server(vec![MockResponse::text(401, "bad key")]).await;

        let registry = ProviderRegistry::new(vec![
            provider("empty", "EMPTY_KEY", empty.url("models")),
            provider("broken", "BROKEN_KEY", broken.url("models")),
        ]);
        let creds = credentials(&[("EMPTY_KEY", "1"), ("BROKEN_KEY", "2")]);

        let err = discover_all(&test_client(), &registry, &creds, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err, DiscoveryError::NoModels);
        assert_eq!(err.to_string(), "no models found from any provider");
    }

    #[tokio::test]
    async fn no_configured_providers_is_an_error() {
        let registry = ProviderRegistry::new(vec![provider(
            "openai",
            "OPENAI_API_KEY",
            "http://127.0.0.1:9/models".to_string(),
        )]);
        let err = discover_all(
            &test_client(),
            &registry,
            &credentials(&[]),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err, DiscoveryError::NoModels);
    }
}
