pub mod sources;

use std::{path::PathBuf, time::Duration};

use tracemirror_core::{
    infrastructure::LightstepSettings, sync::SyncConfig,
};
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub lightstep: LightstepConfig,
    pub sync: SyncConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Lightstep API coordinates. Credentials stay optional here so a
/// deployment with synchronization disabled does not need them.
#[derive(Clone)]
pub struct LightstepConfig {
    pub host: Url,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for LightstepConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightstepConfig")
            .field("host", &self.host.as_str())
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl LightstepConfig {
    /// Names of the credentials that are still unset.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.organization.is_none() {
            missing.push("LIGHTSTEP_ORG");
        }
        if self.project.is_none() {
            missing.push("LIGHTSTEP_PROJECT");
        }
        if self.api_key.is_none() {
            missing.push("LIGHTSTEP_API_KEY");
        }
        missing
    }

    /// Client settings, available once every credential is present.
    pub fn settings(&self) -> Option<LightstepSettings> {
        Some(LightstepSettings {
            host: self.host.clone(),
            organization: self.organization.clone()?,
            project: self.project.clone()?,
            api_key: self.api_key.clone()?,
            request_timeout: self.request_timeout,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
