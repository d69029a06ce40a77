use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::core::builtin_providers::ProviderDescriptor;
use crate::core::json_path::{extract_models, JsonPathError};
use crate::core::providers::Credential;
use crate::utils::http::add_listing_auth;

#[derive(Debug)]
pub enum ModelListError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Json(serde_json::Error),
    Path(JsonPathError),
}

impl fmt::Display for ModelListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelListError::Http(err) if err.is_timeout() => {
                write!(f, "model listing timed out")
            }
            ModelListError::Http(err) => write!(f, "model listing request failed: {err}"),
            ModelListError::Status { status, body } => {
                write!(f, "model listing failed with status {status}: {body}")
            }
            ModelListError::Json(err) => write!(f, "model listing returned invalid JSON: {err}"),
            ModelListError::Path(err) => write!(f, "unexpected model listing shape: {err}"),
        }
    }
}

impl Error for ModelListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelListError::Http(err) => Some(err),
            ModelListError::Json(err) => Some(err),
            ModelListError::Path(err) => Some(err),
            ModelListError::Status { .. } => None,
        }
    }
}

/// GET a provider's model-listing endpoint and pull identifiers out of the
/// payload with the provider's JSON path.
pub async fn fetch_provider_models(
    client: &reqwest::Client,
    provider: &ProviderDescriptor,
    credential: &Credential,
    timeout: Duration,
) -> Result<Vec<String>, ModelListError> {
    let request = client
        .get(&provider.models.url)
        .header("Content-Type", "application/json")
        .timeout(timeout);
    let request = add_listing_auth(request, provider.auth, credential.api_key());

    let response = request.send().await.map_err(ModelListError::Http)?;

    let status = response.status();
    let body = response.text().await.map_err(ModelListError::Http)?;
    if !status.is_success() {
        return Err(ModelListError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }

    let payload: serde_json::Value = serde_json::from_str(&body).map_err(ModelListError::Json)?;
    extract_models(&payload, &provider.models.json_path).map_err(ModelListError::Path)
}
