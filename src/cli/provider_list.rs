use crate::core::providers::{CredentialSource, ProviderRegistry};

/// Table of providers with their endpoint and whether a credential is set.
/// The default provider is marked with `*`.
pub fn format_provider_table(
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
    default_provider: &str,
) -> String {
    let rows: Vec<(String, String, String, &str)> = registry
        .iter()
        .zip(registry.auth_status(credentials))
        .map(|(provider, (id, display_name, configured))| {
            let id = if id.eq_ignore_ascii_case(default_provider) {
                format!("{id}*")
            } else {
                id
            };
            let url = match provider.base_url.urls().as_slice() {
                [] => String::new(),
                [single] => single.to_string(),
                [first, rest @ ..] => format!("{first} (+{} regions)", rest.len()),
            };
            (id, display_name, url, if configured { "✅" } else { "❌" })
        })
        .collect();

    let id_width = rows.iter().map(|row| row.0.chars().count()).max().unwrap_or(0).max(8);
    let name_width = rows.iter().map(|row| row.1.chars().count()).max().unwrap_or(0).max(12);

    let mut table = format!(
        "{:<id_width$}  {:<name_width$}  CREDENTIAL  URL\n",
        "PROVIDER", "DISPLAY NAME"
    );
    for (id, display_name, url, status) in rows {
        table.push_str(&format!(
            "{id:<id_width$}  {display_name:<name_width$}  {status:<10}  {url}\n"
        ));
    }
    table.push_str("\n* = default provider");
    table
}

pub fn list_providers(
    registry: &ProviderRegistry,
    credentials: &dyn CredentialSource,
    default_provider: &str,
) {
    if registry.is_empty() {
        println!("No providers configured.");
        return;
    }
    println!("{}", format_provider_table(registry, credentials, default_provider));
}
