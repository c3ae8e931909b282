use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dispatch_core::ledger::default_roster;
use dispatch_core::model::{AgencyType, TeamStatus};
use dispatch_core::registry::DEFAULT_MAX_DISTANCE_KM;
use dispatch_core::DispatchConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser)]
#[command(name = "dispatch-daemon", version, about = "Emergency dispatch coordination daemon")]
pub struct Cli {
    /// TOML config file. Flags given on the command line override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where the HTTP API will listen, e.g. 127.0.0.1:7878
    #[arg(long)]
    pub listen: Option<String>,

    /// JSON agency catalog. The built-in catalog is used when unset.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Upper bound on each collaborator call (location lookup, marker, notify).
    #[arg(long)]
    pub collaborator_timeout_ms: Option<u64>,

    /// Search radius for emergency reports, in km.
    #[arg(long)]
    pub default_radius_km: Option<f64>,

    /// POST notifications to this URL instead of only logging them.
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long)]
    pub log: Option<String>,
}

/// One roster entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TeamConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub team_type: AgencyType,
    #[serde(default)]
    pub status: TeamStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    pub listen: String,
    pub catalog: Option<PathBuf>,
    pub collaborator_timeout_ms: u64,
    pub default_radius_km: f64,
    pub webhook_url: Option<String>,
    pub log: String,
    pub teams: Vec<TeamConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7878".to_string(),
            catalog: None,
            collaborator_timeout_ms: 5_000,
            default_radius_km: DEFAULT_MAX_DISTANCE_KM,
            webhook_url: None,
            log: "info".to_string(),
            teams: default_roster()
                .into_iter()
                .map(|(name, team_type)| TeamConfig {
                    name: name.to_string(),
                    team_type,
                    status: TeamStatus::Available,
                })
                .collect(),
        }
    }
}

impl DaemonConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg: DaemonConfig =
            toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Defaults, then the `--config` file, then explicit flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut cfg = match &cli.config {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        if let Some(listen) = &cli.listen {
            cfg.listen = listen.clone();
        }
        if let Some(catalog) = &cli.catalog {
            cfg.catalog = Some(catalog.clone());
        }
        if let Some(ms) = cli.collaborator_timeout_ms {
            cfg.collaborator_timeout_ms = ms;
        }
        if let Some(km) = cli.default_radius_km {
            cfg.default_radius_km = km;
        }
        if let Some(url) = &cli.webhook_url {
            cfg.webhook_url = Some(url.clone());
        }
        if let Some(log) = &cli.log {
            cfg.log = log.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.collaborator_timeout_ms == 0 {
            bail!("collaborator_timeout_ms must be positive");
        }
        if !self.default_radius_km.is_finite() || self.default_radius_km < 0.0 {
            bail!(
                "default_radius_km must be a non-negative number, got {}",
                self.default_radius_km
            );
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.listen))
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            collaborator_timeout: Duration::from_millis(self.collaborator_timeout_ms),
            default_radius_km: self.default_radius_km,
        }
    }
}
