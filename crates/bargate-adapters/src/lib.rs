//! Source adapters and query resolution for the bar gateway.
//!
//! Each configured source is described by a [`bargate_core::SourceDescriptor`]
//! and brought to life by an [`AdapterRegistry`] constructor keyed on the
//! descriptor's type. [`QueryResolver`] ties the pieces together: persisted
//! bars first, then live adapters in catalog order.

pub mod adapter;
pub mod client;
pub mod dataset;
pub mod error;
pub mod file;
pub mod polygon;
pub mod registry;
pub mod remote;
pub mod resolve;
pub mod stockdata;
pub mod timeparse;

pub use adapter::SourceAdapter;
pub use client::{ApiClient, ApiRow, ClientRegistry};
pub use dataset::{DataFormat, DatasetAdapter};
pub use error::{AdapterError, RegistryError};
pub use file::FileAdapter;
pub use polygon::PolygonClient;
pub use registry::AdapterRegistry;
pub use remote::RemoteAdapter;
pub use resolve::{BarQuery, QueryError, QueryResolver, Resolution};
pub use stockdata::StockDataClient;
