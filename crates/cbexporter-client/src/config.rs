use std::time::Duration;

use cbexporter_common::error::{ExporterError, Result};
use url::Url;

pub const DEFAULT_PORT: u16 = 8091;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Management endpoint of the cluster. An explicit port in `address`
    /// wins over `port`.
    pub fn base_url(&self) -> Result<Url> {
        let address = self.address.trim().trim_end_matches('/');
        if address.is_empty() {
            return Err(ExporterError::InvalidArgument(
                "cluster address must not be empty".to_string(),
            ));
        }

        let mut url = Url::parse(&ensure_http_scheme(address)).map_err(|err| {
            ExporterError::InvalidArgument(format!("invalid cluster address {address}: {err}"))
        })?;

        if url.port().is_none() {
            url.set_port(Some(self.port)).map_err(|_| {
                ExporterError::InvalidArgument(format!(
                    "cannot set port on cluster address {address}"
                ))
            })?;
        }

        Ok(url)
    }
}

fn ensure_http_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;

    #[test]
    fn bare_host_gets_scheme_and_port() {
        let url = ClientConfig::new("cb.local", "u", "p").base_url().unwrap();
        assert_eq!(url.as_str(), "http://cb.local:8091/");
    }

    #[test]
    fn explicit_port_and_scheme_are_kept() {
        let url = ClientConfig::new("https://cb.local:18091/", "u", "p")
            .with_port(9000)
            .base_url()
            .unwrap();
        assert_eq!(url.as_str(), "https://cb.local:18091/");
    }

    #[test]
    fn empty_address_is_rejected() {
        assert!(ClientConfig::new("  ", "u", "p").base_url().is_err());
    }
}
