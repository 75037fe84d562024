//! Collaborator seams. The sync core only ever sees these traits; concrete
//! clients are injected at construction.

pub mod catalog;
pub mod channel;
pub mod registry;

pub use catalog::CatalogClient;
pub use channel::WorkChannel;
pub use registry::RegistryStore;

#[cfg(test)]
pub use catalog::MockCatalogClient;
#[cfg(test)]
pub use channel::MockWorkChannel;
#[cfg(test)]
pub use registry::MockRegistryStore;
