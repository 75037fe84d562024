//! Concrete adapters for the collaborator ports.

pub mod lightstep;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_channel;

pub use lightstep::{LightstepCatalogClient, LightstepSettings};
#[cfg(feature = "postgres")]
pub use postgres::PostgresRegistryStore;
#[cfg(feature = "redis")]
pub use redis_channel::RedisWorkChannel;
