pub mod error;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tracemirror_core::{
    infrastructure::lightstep::DEFAULT_LIGHTSTEP_HOST, sync::SyncConfig,
};
use tracing::debug;
use url::Url;

use crate::{
    models::{
        Config, ConfigMetadata, DatabaseConfig, LightstepConfig, RedisConfig,
        ServerConfig,
        sources::{EnvConfig, FileConfig},
    },
    validation::{self, ConfigWarnings},
};

pub use error::ConfigLoadError;

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["tracemirror.toml", "config/tracemirror.toml"];
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_CONNECTIONS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Skip `.env` discovery entirely.
    pub skip_env_file: bool,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Resolves configuration from `.env`, an optional TOML file and the
/// environment. Environment values override the file; defaults fill the
/// rest.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.options.skip_env_file = true;
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Compose from an already gathered environment. The process
    /// environment is not read.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path, env_file_loaded)?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.options.skip_env_file {
            return Ok(false);
        }

        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };

        match loaded {
            Ok(loaded) => Ok(loaded),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        // An explicitly requested file must exist; defaults are optional.
        let (path, explicit) = if let Some(path) = &self.options.config_path {
            (path.clone(), true)
        } else if let Some(path) = &env.config_path {
            (path.clone(), true)
        } else {
            match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => (path, false),
                None => return Ok((None, None)),
            }
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No tracemirror.toml detected; using environment variables and defaults",
                "Pass --config or set TRACEMIRROR_CONFIG to use a file",
            );
        }
        for (key, raw) in &env.unparsed {
            warnings.push(format!("Ignoring unparseable {key}={raw:?}"));
        }

        let FileConfig {
            server: file_server,
            database: file_database,
            redis: file_redis,
            lightstep: file_lightstep,
            sync: file_sync,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let database = DatabaseConfig {
            url: env.database_url.clone().or(file_database.url),
            max_connections: env
                .database_max_connections
                .or(file_database.max_connections)
                .unwrap_or(DEFAULT_DB_CONNECTIONS),
        };

        let redis = env
            .redis_url()
            .map(|url| RedisConfig { url })
            .or_else(|| file_redis.map(|r| RedisConfig { url: r.url }));

        let host = env
            .lightstep_host
            .clone()
            .or(file_lightstep.host)
            .unwrap_or_else(|| DEFAULT_LIGHTSTEP_HOST.to_string());
        let lightstep = LightstepConfig {
            host: Url::parse(&host).map_err(|source| {
                ConfigLoadError::InvalidCatalogHost {
                    host: host.clone(),
                    source,
                }
            })?,
            organization: env.lightstep_org.clone().or(file_lightstep.organization),
            project: env.lightstep_project.clone().or(file_lightstep.project),
            api_key: env.lightstep_api_key.clone().or(file_lightstep.api_key),
            request_timeout: file_lightstep
                .request_timeout
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        let sync = merge_sync(file_sync.unwrap_or_default(), &env);

        let config = Config {
            server,
            database,
            redis,
            lightstep,
            sync,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_sync(mut sync: SyncConfig, env: &EnvConfig) -> SyncConfig {
    if let Some(enabled) = env.sync_enabled {
        sync.enabled = enabled;
    }
    if let Some(minutes) = env.sync_interval_minutes {
        sync.interval_minutes = minutes;
    }
    if let Some(lookback) = env.stream_lookback {
        sync.stream_lookback = lookback;
    }
    if let Some(range) = env.stream_range {
        sync.stream_range = range;
    }
    if let Some(concurrency) = env.stream_concurrency {
        sync.max_concurrent_streams = concurrency;
    }
    if let Some(topic) = &env.traces_topic {
        sync.topic = topic.clone();
    }
    sync
}
