use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error reading source catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed source catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid source entry '{name}': {reason}")]
    InvalidSource { name: String, reason: String },
}
