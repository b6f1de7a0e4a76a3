//! Registry builder.
//!
//! Wires each enabled adapter to its external client and registers its
//! operations. Transports share the resulting registry.

use std::sync::Arc;

use tracing::info;

use crate::core::config::{AdapterKind, Config};

use super::definitions::calendar::{CalendarAdapter, GoogleCalendar};
use super::definitions::fs::FilesystemAdapter;
use super::definitions::git::{GitAdapter, SystemGit};
use super::definitions::gmail::{GmailAdapter, GoogleMail};
use super::definitions::google::{CALENDAR_API, GMAIL_API, GoogleAuth, GoogleClient};
use super::definitions::greet::GreetTool;
use super::definitions::postgres::{PgDatabase, PostgresAdapter};
use super::definitions::whatsapp::{GreenApi, WhatsAppAdapter};
use super::{OperationRegistry, RegistryError};

/// Build the registry with every adapter listed in `config.adapters.enabled`.
///
/// Clients connect lazily, so missing credentials only surface when an
/// operation is invoked.
pub fn build_registry(config: &Config) -> Result<OperationRegistry, RegistryError> {
    let mut registry = OperationRegistry::new();
    let http = reqwest::Client::new();
    let google = Arc::new(GoogleAuth::new(config.credentials.google.clone(), http.clone()));

    for kind in &config.adapters.enabled {
        let before = registry.len();
        match kind {
            AdapterKind::Greet => GreetTool::register(&mut registry)?,
            AdapterKind::Filesystem => Arc::new(FilesystemAdapter::new(
                config.security.clone(),
                config.adapters.read_preview_chars,
            ))
            .register(&mut registry)?,
            AdapterKind::Git => Arc::new(GitAdapter::new(
                Arc::new(SystemGit::new()),
                config.security.clone(),
                config.adapters.git_repo_base.clone(),
            ))
            .register(&mut registry)?,
            AdapterKind::Postgres => Arc::new(PostgresAdapter::new(Arc::new(PgDatabase::new(
                config.credentials.postgres.clone(),
            ))))
            .register(&mut registry)?,
            AdapterKind::Calendar => {
                let client = GoogleClient::new(http.clone(), google.clone(), CALENDAR_API);
                Arc::new(CalendarAdapter::new(Arc::new(GoogleCalendar::new(client))))
                    .register(&mut registry)?
            }
            AdapterKind::Gmail => {
                let client = GoogleClient::new(http.clone(), google.clone(), GMAIL_API);
                Arc::new(GmailAdapter::new(
                    Arc::new(GoogleMail::new(client)),
                    config.security.clone(),
                ))
                .register(&mut registry)?
            }
            AdapterKind::WhatsApp => Arc::new(WhatsAppAdapter::new(Arc::new(GreenApi::new(
                http.clone(),
                &config.credentials.green_api,
            ))))
            .register(&mut registry)?,
        }
        info!("Adapter '{}' registered {} operations", kind, registry.len() - before);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{ErrorKind, InvocationResult};
    use serde_json::json;

    fn config_with(enabled: Vec<AdapterKind>) -> Config {
        let mut config = Config::default();
        config.adapters.enabled = enabled;
        config
    }

    #[test]
    fn test_all_adapters_register_without_collisions() {
        let registry = build_registry(&Config::default()).unwrap();
        let names: Vec<_> = registry.list_operations().map(|op| op.name.clone()).collect();

        assert_eq!(names.first().map(String::as_str), Some("greet"));
        for name in ["list_directory", "git_status", "list_databases", "list_events", "list_emails", "send_message"] {
            assert!(names.iter().any(|n| n == name), "missing {name}");
        }
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_only_enabled_adapters() {
        let registry = build_registry(&config_with(vec![AdapterKind::Greet])).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(build_registry(&config_with(vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_enabling_twice_is_a_duplicate() {
        let err = build_registry(&config_with(vec![AdapterKind::Greet, AdapterKind::Greet]))
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateOperation("greet".to_string()));
    }

    #[tokio::test]
    async fn test_unconfigured_whatsapp_fails_as_handler_error() {
        let registry = build_registry(&config_with(vec![AdapterKind::WhatsApp])).unwrap();
        let result = registry.invoke("get_account_status", json!({})).await;
        assert_eq!(
            result,
            InvocationResult::failure(ErrorKind::HandlerError, "Green-API is not configured")
        );
    }
}
