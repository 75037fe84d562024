use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use tracemirror_core::sync::SyncConfig;

use crate::util::{non_empty, parse_bool, parse_duration_minutes};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub lightstep: FileLightstepConfig,
    /// Parsed with the core defaults filling any missing keys.
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLightstepConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration"
    )]
    pub request_timeout: Option<Duration>,
}

/// Environment-derived configuration values.
///
/// Unparseable numbers and booleans are kept as `None` so the file or the
/// default wins; the raw text is remembered for a warning.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub redis_url: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: Option<u16>,
    pub lightstep_host: Option<String>,
    pub lightstep_org: Option<String>,
    pub lightstep_project: Option<String>,
    pub lightstep_api_key: Option<String>,
    pub sync_enabled: Option<bool>,
    pub sync_interval_minutes: Option<u32>,
    pub stream_lookback: Option<Duration>,
    pub stream_range: Option<Duration>,
    pub stream_concurrency: Option<usize>,
    pub traces_topic: Option<String>,
    pub unparsed: Vec<(&'static str, String)>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut vars = EnvReader {
            lookup,
            unparsed: Vec::new(),
        };

        Self {
            config_path: vars.text("TRACEMIRROR_CONFIG").map(PathBuf::from),
            server_host: vars.text("SERVER_HOST"),
            server_port: vars.parse("SERVER_PORT", |raw| raw.parse().ok()),
            database_url: vars.text("DATABASE_URL"),
            database_max_connections: vars
                .parse("DATABASE_MAX_CONNECTIONS", |raw| raw.parse().ok()),
            redis_url: vars.text("REDIS_URL"),
            redis_host: vars.text("REDIS_HOST"),
            redis_port: vars.parse("REDIS_PORT", |raw| raw.parse().ok()),
            lightstep_host: vars.text("LIGHTSTEP_HOST"),
            lightstep_org: vars.text("LIGHTSTEP_ORG"),
            lightstep_project: vars.text("LIGHTSTEP_PROJECT"),
            lightstep_api_key: vars.text("LIGHTSTEP_API_KEY"),
            sync_enabled: vars.parse("ENABLE_SCHEDULER", parse_bool),
            sync_interval_minutes: vars
                .parse("SCHEDULER_INTERVAL_MINUTES", |raw| raw.parse().ok()),
            stream_lookback: vars
                .parse("STREAM_TIME_AGO", parse_duration_minutes),
            stream_range: vars
                .parse("STREAM_TIME_RANGE", parse_duration_minutes),
            stream_concurrency: vars
                .parse("STREAM_CONCURRENCY", |raw| raw.parse().ok()),
            traces_topic: vars.text("TRACES_TOPIC"),
            unparsed: vars.unparsed,
        }
    }

    /// `REDIS_URL` wins; otherwise a URL is assembled from host and port.
    pub fn redis_url(&self) -> Option<String> {
        if let Some(url) = &self.redis_url {
            return Some(url.clone());
        }
        let host = self.redis_host.as_ref()?;
        let port = self.redis_port.unwrap_or(6379);
        Some(format!("redis://{host}:{port}"))
    }
}

struct EnvReader<F> {
    lookup: F,
    unparsed: Vec<(&'static str, String)>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&self, key: &str) -> Option<String> {
        (self.lookup)(key).and_then(non_empty)
    }

    fn parse<T>(
        &mut self,
        key: &'static str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = self.text(key)?;
        let value = parse(&raw);
        if value.is_none() {
            self.unparsed.push((key, raw));
        }
        value
    }
}

mod optional_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;
    use tracemirror_core::sync::config::duration_serde;

    pub fn serialize<S>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => duration_serde::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "duration_serde")] Duration);

        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(d)| d))
    }
}
