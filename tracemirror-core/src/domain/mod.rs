//! Data exchanged between the catalog, the sync core and the sinks.

pub mod service;
pub mod stream;
pub mod window;

pub use service::{
    BatchResult, RemoteService, ServiceFilter, ServiceRecord, ServiceUpsert,
};
pub use stream::{Exemplar, PublishAck, StreamId};
pub use window::{LookbackWindow, TimeWindow, WindowOutOfRange};
