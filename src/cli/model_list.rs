//! Model listing for one provider or across all of them

use std::error::Error;

use crate::api::models::fetch_provider_models;
use crate::core::constants::MODEL_LIST_TIMEOUT;
use crate::core::discovery::{discover_all, DiscoveryResult};
use crate::core::error::ConfigurationError;
use crate::core::providers::{resolve_credential, CredentialSource, ProviderRegistry};

/// Models offered by `provider_id`, sorted by name. Unlike discovery, a
/// missing credential is an error here.
pub async fn provider_models(
    client: &reqwest::Client,
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
    provider_id: &str,
) -> Result<Vec<String>, Box<dyn Error>> {
    let provider = registry.require(provider_id)?;
    let credential = resolve_credential(provider, credentials).ok_or_else(|| {
        ConfigurationError::MissingCredential {
            provider: provider.id.clone(),
            env_name: provider.env_name.clone().unwrap_or_default(),
        }
    })?;

    let mut models =
        fetch_provider_models(client, provider, &credential, MODEL_LIST_TIMEOUT).await?;
    models.sort();
    models.dedup();
    Ok(models)
}

pub async fn list_models(
    client: &reqwest::Client,
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
    provider_id: &str,
    current_model: &str,
) -> Result<(), Box<dyn Error>> {
    let models = provider_models(client, registry, credentials, provider_id).await?;
    if models.is_empty() {
        println!("No models found for {provider_id}.");
        return Ok(());
    }
    for model in models {
        let marker = if model == current_model { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}

/// Every model from every configured provider, as sorted `provider|model`
/// lines.
pub async fn all_model_lines(
    client: &reqwest::Client,
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
) -> Result<Vec<String>, Box<dyn Error>> {
    let results = discover_all(client, registry, credentials, MODEL_LIST_TIMEOUT).await?;
    let mut lines: Vec<String> = results.iter().map(DiscoveryResult::to_string).collect();
    lines.sort();
    Ok(lines)
}

pub async fn list_all_models(
    client: &reqwest::Client,
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
) -> Result<(), Box<dyn Error>> {
    for line in all_model_lines(client, registry, credentials).await? {
        println!("{line}");
    }
    Ok(())
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

    fn registry_for(url: String, auth: AuthMode) -> ProviderRegistry {
        ProviderRegistry::new(vec![ProviderDescriptor {
            id: "local".to_string(),
            display_name: "Local".to_string(),
            env_name: Some("LOCAL_KEY".to_string()),
            base_url: BaseUrl::Single("http://localhost/v1".to_string()),
            auth,
            models: ModelListEndpoint {
                url,
                json_path: "models.name".to_string(),
            },
        }])
    }

    #[tokio::test]
    async fn provider_models_are_sorted_and_deduplicated() {
        let server = spawn_mock_server(vec![MockResponse::json(
            200,
            json!({"models": [{"name": "zeta"}, {"name": "alpha"}, {"name": "zeta"}]}),
        )])
        .await;
        let registry = registry_for(server.url("api/tags"), AuthMode::Anthropic);
        let credentials: HashMap<String, String> =
            [("LOCAL_KEY".to_string(), "secret".to_string())].into();

        let models = provider_models(&test_client(), &registry, &credentials, "local")
            .await
            .unwrap();
        assert_eq!(models, vec!["alpha", "zeta"]);

        let request = &server.captured().await[0];
        assert!(request.request_line.starts_with("GET /api/tags"));
        assert_eq!(request.header("x-api-key"), Some("secret"));
        assert_eq!(request.header("anthropic-version"), Some("2023-06-01"));
    }

    #[tokio::test]
    async fn missing_credential_is_reported_before_any_request() {
        let server = spawn_mock_server(vec![MockResponse::json(200, json!({"models": []}))]).await;
        let registry = registry_for(server.url("models"), AuthMode::OpenAi);

        let err = provider_models(&test_client(), &registry, &HashMap::new(), "local")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("export LOCAL_KEY="));
        assert!(server.captured().await.is_empty());
    }

    #[tokio::test]
    async fn all_model_lines_are_namespaced_and_sorted() {
        let server = spawn_mock_server(vec![MockResponse::json(
            200,
            json!({"models": [{"name": "b"}, {"name": "a"}]}),
        )])
        .await;
        let registry = registry_for(server.url("models"), AuthMode::OpenAi);
        let credentials: HashMap<String, String> =
            [("LOCAL_KEY".to_string(), "k".to_string())].into();

        let lines = all_model_lines(&test_client(), &registry, &credentials)
            .await
            .unwrap();
        assert_eq!(lines, vec!["local|a", "local|b"]);
    }
}
