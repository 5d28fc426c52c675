use std::time::Duration;

use cbexporter_client::ClientConfig;
use cbexporter_collectors::CollectorSettings;
use clap::Parser;

pub const USERNAME_ENV: &str = "CB_EXPORTER_USERNAME";
pub const PASSWORD_ENV: &str = "CB_EXPORTER_PASSWORD";
pub const TOKEN_ENV: &str = "CB_EXPORTER_TOKEN";

const DEFAULT_USERNAME: &str = "Administrator";

#[derive(Debug, Parser)]
#[command(name = "cbexporter", about = "Couchbase per-node bucket stats exporter")]
pub struct Cli {
    #[arg(long, default_value = "localhost")]
    pub couchbase_address: String,

    #[arg(long, default_value = "8091")]
    pub couchbase_port: u16,

    /// Falls back to CB_EXPORTER_USERNAME, then "Administrator".
    #[arg(long)]
    pub couchbase_username: Option<String>,

    /// Falls back to CB_EXPORTER_PASSWORD.
    #[arg(long)]
    pub couchbase_password: Option<String>,

    #[arg(long, default_value = "0.0.0.0")]
    pub server_address: String,

    #[arg(long, default_value = "9091")]
    pub server_port: u16,

    /// Seconds between per-node bucket stats cycles.
    #[arg(long, default_value = "5")]
    pub per_node_refresh: u64,

    /// Seconds before a cluster request is abandoned.
    #[arg(long, default_value = "10")]
    pub request_timeout: u64,

    /// Bearer token required on /metrics. Falls back to CB_EXPORTER_TOKEN.
    #[arg(long)]
    pub token: Option<String>,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value_t = false)]
    pub log_json: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    pub fn client_config(&self, env: impl Fn(&str) -> Option<String>) -> ClientConfig {
        let username = self
            .couchbase_username
            .clone()
            .or_else(|| env(USERNAME_ENV))
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let password = self
            .couchbase_password
            .clone()
            .or_else(|| env(PASSWORD_ENV))
            .unwrap_or_default();

        ClientConfig::new(self.couchbase_address.clone(), username, password)
            .with_port(self.couchbase_port)
            .with_timeout(Duration::from_secs(self.request_timeout))
    }

    pub fn token(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.token.clone().or_else(|| env(TOKEN_ENV))
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings::with_refresh_secs(self.per_node_refresh)
    }
}

/// Process environment lookup used outside tests.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
