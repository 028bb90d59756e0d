use thiserror::Error;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from cache operations.
///
/// Callers in the message service swallow these; only session lookups,
/// which have no durable fallback, surface them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache codec error: {0}")]
    Codec(String),
}

/// Errors surfaced by the message services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Repository(RepositoryError),

    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("circuit breaker '{0}' is half-open and admitting no more trial calls")]
    TooManyRequests(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("operation failed after retries: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ServiceError>,
    },
}

impl ServiceError {
    /// Permanent errors are returned to the caller as-is: never retried and
    /// never counted against a circuit breaker.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ServiceError::NotFound | ServiceError::Conflict(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => ServiceError::NotFound,
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Repository(other),
        }
    }
}
