use thiserror::Error;

use crate::{proxy::Batch, record_set::SyncReport};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Misconfiguration detected at the call site, before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No record schema or factory configured: cannot create records from {0}")]
    MissingSchema(String),

    #[error("Record data must be a JSON object, got {0}")]
    InvalidRecordData(String),

    #[error("No proxy configured on the record set or its record schema")]
    MissingProxy,

    #[error("No async runtime available to issue backend requests")]
    NoRuntime,

    #[error("Paged loading requires a page size; configure `page_size` first")]
    MissingPageSize,

    #[error("Invalid page range {start}..={end}: pages are 1-based and start must not exceed end")]
    InvalidPage { start: usize, end: usize },
}

// ---------------------------------------------------------------------------
// ProxyError
// ---------------------------------------------------------------------------

/// Classification of backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyErrorKind {
    /// Retriable (network, temporary failures)
    Transient,
    /// Not retriable (validation, rejected payload, etc.)
    Permanent,
    /// The backend has no record with the requested id
    NotFound,
    /// The proxy does not implement the requested action
    Unsupported,
}

/// Backend-level error reported by a [`Proxy`](crate::proxy::Proxy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProxyError {
    pub message: String,
    pub kind: ProxyErrorKind,
}

impl ProxyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ProxyErrorKind::Transient,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: ProxyErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn unsupported(action: &str) -> Self {
        Self::with_kind(
            format!("Proxy does not support the \"{action}\" action"),
            ProxyErrorKind::Unsupported,
        )
    }
}

// ---------------------------------------------------------------------------
// RecordError
// ---------------------------------------------------------------------------

/// Failure of a single record's `save` or `destroy`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Proxy request for record {client_id} failed: {source}")]
    Proxy {
        client_id: u64,
        #[source]
        source: ProxyError,
    },

    #[error("Record {0} has already been destroyed")]
    Destroyed(u64),
}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Asynchronous load failure. Carries the batch so callers can inspect
/// which operations completed.
#[derive(Debug, Clone, Error)]
#[error("Load failed ({failed} of {total} operations): {source}")]
pub struct LoadError {
    pub batch: Batch,
    pub failed: usize,
    pub total: usize,
    #[source]
    pub source: ProxyError,
}

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// At least one save or destroy failed. Operations that succeeded keep
    /// their effects.
    #[error("Sync partially failed: {} of {} operations failed", .report.failures.len(), .report.attempted())]
    Partial { report: SyncReport },

    /// The sync task ended before reporting, e.g. on runtime shutdown.
    #[error("Sync task ended before settling")]
    Interrupted,
}

impl SyncError {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Partial { report } => Some(report),
            Self::Interrupted => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
