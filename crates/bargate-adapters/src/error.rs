use thiserror::Error;

/// Failure inside one adapter's fetch or construction. The resolution loop
/// downgrades fetch-time instances of this to "try the next source".
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Adapter configuration error: {0}")]
    Config(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Registration and lookup failures. Distinct from [`AdapterError`] so
/// callers can tell a misconfigured gateway from a source with no data.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration is one-shot; the first constructor stays active.
    #[error("adapter already registered for source type '{0}'")]
    DuplicateRegistration(String),

    #[error("no adapter registered for source type '{0}'")]
    UnknownSourceType(String),

    #[error("failed to construct adapter: {0}")]
    Construction(#[from] AdapterError),
}
