use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::models::Endpoint;

/// Largest number of hosts a single CIDR entry may expand to.
pub const MAX_EXPANDED_HOSTS: usize = 4096;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    pub servers: Vec<Server>,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_timeout")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    pub admin_chat_id: String,
    pub notifier: NotifierConfig,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_ms: u64,
}

fn default_check_interval() -> u64 { 60 }
fn default_retention_days() -> u32 { crate::retention::DEFAULT_RETENTION_DAYS }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_api_port() -> u16 { 3000 }
fn default_max_concurrency() -> usize { 64 }
fn default_notify_timeout() -> u64 { 10_000 }
fn default_timeout() -> u64 { 2000 }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Server {
    pub name: String,
    /// Host name, IP address, or CIDR block expanded to its hosts.
    pub address: String,
    #[serde(default)]
    pub check: CheckType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum CheckType {
    #[default]
    Ping,
    TcpPort { port: u16 },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifierConfig {
    Telegram { bot_token: String },
    Webhook { url: String },
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: MonitorConfig = serde_json::from_str(content)
            .map_err(|e| MonitorError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval == 0 {
            return Err(MonitorError::Config("check_interval must be positive".into()));
        }
        if self.probe_timeout_ms == 0 {
            return Err(MonitorError::Config("probe_timeout_ms must be positive".into()));
        }
        if self.admin_chat_id.trim().is_empty() {
            return Err(MonitorError::Config("admin_chat_id is empty".into()));
        }
        match &self.notifier {
            NotifierConfig::Telegram { bot_token } if bot_token.trim().is_empty() => {
                return Err(MonitorError::Config("telegram bot_token is empty".into()));
            }
            NotifierConfig::Webhook { url } if url.trim().is_empty() => {
                return Err(MonitorError::Config("webhook url is empty".into()));
            }
            _ => {}
        }
        self.endpoints().map(|_| ())
    }

    /// Expands the configured servers into the ordered, static endpoint set.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        if self.servers.is_empty() {
            return Err(MonitorError::Config("no servers configured".into()));
        }

        let mut seen = HashSet::new();
        let mut endpoints = Vec::new();
        for server in &self.servers {
            if server.name.trim().is_empty() || server.address.trim().is_empty() {
                return Err(MonitorError::Config(
                    "server entries need a name and an address".into(),
                ));
            }

            let addresses = if let Ok(net) = server.address.parse::<IpNet>() {
                let hosts: Vec<_> = net
                    .hosts()
                    .take(MAX_EXPANDED_HOSTS + 1)
                    .map(|ip| ip.to_string())
                    .collect();
                if hosts.len() > MAX_EXPANDED_HOSTS {
                    return Err(MonitorError::Config(format!(
                        "{} expands to more than {} hosts",
                        net, MAX_EXPANDED_HOSTS
                    )));
                }
                hosts
            } else {
                vec![server.address.clone()]
            };

            for address in addresses {
                if !seen.insert(address.clone()) {
                    return Err(MonitorError::Config(format!(
                        "duplicate server address {}",
                        address
                    )));
                }
                endpoints.push(Endpoint {
                    name: server.name.clone(),
                    address,
                    check: server.check,
                });
            }
        }
        Ok(endpoints)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}
