//! Core types for the bargate market-data gateway: the canonical bar and
//! symbol shapes, source descriptors, and the Parquet-backed bar store.

pub mod bar;
pub mod error;
pub mod period;
pub mod schema;
pub mod source;
pub mod store;
pub mod symbol;

pub use bar::Bar;
pub use error::{CatalogError, StoreError};
pub use period::Period;
pub use source::{SourceCatalog, SourceDescriptor};
pub use store::BarStore;
pub use symbol::Symbol;
