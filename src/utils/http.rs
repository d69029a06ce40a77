//! HTTP helpers shared by chat dispatch and model listing
//!
//! Endpoint joining and the per-provider credential placement.

use crate::core::builtin_providers::AuthMode;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Join a base URL and an endpoint path without doubling slashes.
///
/// ```
/// use parley::utils::http::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.groq.com/openai/v1/", "/chat/completions"),
///     "https://api.groq.com/openai/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

/// Chat requests always use bearer auth; every built-in provider exposes an
/// OpenAI-compatible chat endpoint.
pub fn add_chat_auth(
    request: reqwest::RequestBuilder,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    match api_key.filter(|key| !key.is_empty()) {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Model-listing endpoints are provider-native and place the key differently.
pub fn add_listing_auth(
    request: reqwest::RequestBuilder,
    mode: AuthMode,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    let Some(key) = api_key.filter(|key| !key.is_empty()) else {
        return request;
    };

    match mode {
        AuthMode::OpenAi => request.bearer_auth(key),
        AuthMode::Anthropic => request
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION),
        AuthMode::Google => request.query(&[("key", key)]),
        AuthMode::None => request,
    }
}
