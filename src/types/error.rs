//! Fetch error taxonomy.
//!
//! Callers branch on `ErrorKind` predicates only; no string matching.
//! Transport failures (HTTP, IO, zip) are classified into these kinds at
//! the boundary where they occur.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The proxy was asked not to fetch uncached modules and this one
    /// was not in its cache.
    #[error("not fetched: {0}")]
    NotFetched(String),

    #[error("proxy timed out: {0}")]
    ProxyTimedOut(String),

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bad module: {0}")]
    BadModule(String),

    /// The downloaded go.mod declares a different module path. The declared
    /// path is carried so operators can redirect.
    #[error("module declares path {go_mod_path}: {message}")]
    AlternativeModule { go_mod_path: String, message: String },

    #[error("module too large: {0}")]
    ModuleTooLarge(String),

    #[error("bad package: {0}")]
    BadPackage(String),

    #[error("bad import path: {0}")]
    BadImportPath(String),

    #[error("documentation too large: {0}")]
    DocumentationTooLarge(String),

    #[error("file size limit exceeded: {0}")]
    MaxFileSizeLimitExceeded(String),

    #[error("no supported build context: {0}")]
    BuildContextNotSupported(String),
}

/// The distinctions callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotFetched,
    ProxyTimedOut,
    ProxyError,
    InvalidArgument,
    BadModule,
    AlternativeModule,
    ModuleTooLarge,
    BadPackage,
    BadImportPath,
    DocumentationTooLarge,
    MaxFileSizeLimitExceeded,
    BuildContextNotSupported,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NotFound(_) => ErrorKind::NotFound,
            FetchError::NotFetched(_) => ErrorKind::NotFetched,
            FetchError::ProxyTimedOut(_) => ErrorKind::ProxyTimedOut,
            FetchError::Proxy(_) => ErrorKind::ProxyError,
            FetchError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FetchError::BadModule(_) => ErrorKind::BadModule,
            FetchError::AlternativeModule { .. } => ErrorKind::AlternativeModule,
            FetchError::ModuleTooLarge(_) => ErrorKind::ModuleTooLarge,
            FetchError::BadPackage(_) => ErrorKind::BadPackage,
            FetchError::BadImportPath(_) => ErrorKind::BadImportPath,
            FetchError::DocumentationTooLarge(_) => ErrorKind::DocumentationTooLarge,
            FetchError::MaxFileSizeLimitExceeded(_) => ErrorKind::MaxFileSizeLimitExceeded,
            FetchError::BuildContextNotSupported(_) => ErrorKind::BuildContextNotSupported,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Transient errors must not be cached; a later retry should re-enter
    /// the pipeline.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::ProxyTimedOut
    }

    /// A caller-initiated cancellation. Like an expired deadline it is
    /// transient, so it never enters any cache.
    pub fn cancelled(what: &str) -> FetchError {
        FetchError::ProxyTimedOut(format!("{what}: cancelled"))
    }

    /// Classify an HTTP transport failure from the proxy.
    pub fn from_http(err: &reqwest::Error, what: &str) -> FetchError {
        if err.is_timeout() {
            FetchError::ProxyTimedOut(format!("{what}: {err}"))
        } else {
            FetchError::Proxy(format!("{what}: {err}"))
        }
    }

    /// Classify an IO failure while reading module contents.
    pub fn from_io(err: &std::io::Error, what: &str) -> FetchError {
        if err.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(format!("{what}: {err}"))
        } else {
            FetchError::BadModule(format!("{what}: {err}"))
        }
    }

    /// Classify a malformed-archive failure.
    pub fn from_zip(err: &zip::result::ZipError, what: &str) -> FetchError {
        FetchError::BadModule(format!("{what}: {err}"))
    }
}
