//! HTTP front end for the dispatch engine.

use std::sync::Arc;

use anyhow::Context;
use dispatch_core::catalog::JsonFileCatalog;
use dispatch_core::ledger::AlertLedger;
use dispatch_core::{Collaborators, Dispatcher};

pub mod config;
pub mod http;
pub mod notifier;

use crate::config::DaemonConfig;
use crate::notifier::WebhookNotifier;

/// Wires collaborators from `cfg`, seeds the team roster and loads the
/// agency catalog.
pub async fn build_dispatcher(cfg: &DaemonConfig) -> anyhow::Result<Dispatcher> {
    let mut collaborators = Collaborators::builtin();
    if let Some(path) = &cfg.catalog {
        collaborators = collaborators.with_catalog(Arc::new(JsonFileCatalog::new(path.clone())));
    }
    if let Some(url) = &cfg.webhook_url {
        collaborators = collaborators.with_notifier(Arc::new(WebhookNotifier::new(url.clone())));
    }

    let mut ledger = AlertLedger::new();
    for team in &cfg.teams {
        ledger
            .register_team(&team.name, team.team_type, team.status)
            .with_context(|| format!("register team {:?}", team.name))?;
    }

    let dispatcher = Dispatcher::new(cfg.dispatch_config(), collaborators).with_ledger(ledger);
    let agencies = dispatcher
        .reload_catalog()
        .await
        .context("load agency catalog")?;
    tracing::info!(agencies, teams = cfg.teams.len(), "dispatcher ready");
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamConfig;
    use dispatch_core::model::{AgencyType, TeamStatus};

    #[tokio::test]
    async fn test_build_with_defaults() {
        let d = build_dispatcher(&DaemonConfig::default()).await.unwrap();
        assert_eq!(d.agencies().await.len(), 15);
        assert_eq!(d.teams().await.len(), 4);
    }

    #[tokio::test]
    async fn test_build_with_file_catalog_and_custom_roster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agencies.json");
        std::fs::write(
            &path,
            r#"[{"id": 42, "name": "Harbour Rescue", "type": "flood",
                "location": {"latitude": 18.94, "longitude": 72.83}}]"#,
        )
        .unwrap();

        let cfg = DaemonConfig {
            catalog: Some(path),
            teams: vec![TeamConfig {
                name: "Boat 7".into(),
                team_type: AgencyType::Flood,
                status: TeamStatus::Available,
            }],
            ..DaemonConfig::default()
        };
        let d = build_dispatcher(&cfg).await.unwrap();
        assert_eq!(d.get_agency(42).await.unwrap().name, "Harbour Rescue");
        let teams = d.teams().await;
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "Boat 7");
    }

    #[tokio::test]
    async fn test_missing_catalog_file_fails() {
        let cfg = DaemonConfig {
            catalog: Some("/nonexistent/agencies.json".into()),
            ..DaemonConfig::default()
        };
        assert!(build_dispatcher(&cfg).await.is_err());
    }
}
