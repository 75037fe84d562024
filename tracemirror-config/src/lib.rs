//! Configuration for tracemirror.
//!
//! Values are layered: `.env` is loaded first, then an optional
//! `tracemirror.toml`, then environment variables override the file, and
//! defaults fill whatever remains. Guard rails run on the composed result.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, DatabaseConfig, LightstepConfig, RedisConfig,
    ServerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
