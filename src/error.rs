//! Error types for the mount-point cache.
//!
//! Domain errors ([`SchemaResolutionError`], [`StoreError`],
//! [`TransactionError`], [`ReleaseError`], [`MountPointError`]) are raised
//! by the core components. [`ApiError`] is the HTTP-facing error: each
//! variant maps to a specific HTTP status code and structured JSON error
//! response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::NodeId;
use crate::tx::CommitPhase;

/// Failure to compile a set of module identifiers into a schema model.
#[derive(Debug, thiserror::Error)]
pub enum SchemaResolutionError {
    /// No source text for the module was found in either cache tier.
    #[error("schema source {0} not found in the in-process or on-disk cache")]
    MissingSource(String),

    /// The source text is not a well-formed module.
    #[error("failed to parse schema source {source_id} at line {line}: {message}")]
    Parse {
        /// Identifier of the offending source.
        source_id: String,
        /// 1-based line number where parsing stopped.
        line: usize,
        /// Parser diagnostic.
        message: String,
    },

    /// The source declares a different module than the one requested.
    #[error("schema source {expected} declares module {found}")]
    NameMismatch {
        /// Requested module identifier.
        expected: String,
        /// Module name found in the source text.
        found: String,
    },

    /// The source declares a different revision than the one requested.
    #[error("module {module} requested at revision {expected}, source has {found}")]
    RevisionMismatch {
        /// Module name.
        module: String,
        /// Requested revision.
        expected: String,
        /// Latest revision found in the source, or `none`.
        found: String,
    },

    /// The import graph contains a cycle.
    #[error("import cycle detected: {0}")]
    ImportCycle(String),

    /// The cache directory name is not a single relative path component.
    #[error("invalid schema cache directory name: {0:?}")]
    InvalidCacheDirectory(String),

    /// Reading or writing the on-disk cache failed.
    #[error("schema cache i/o error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure raised by an in-memory store or one of its commit cohorts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store {0} state lock poisoned")]
    Poisoned(String),

    /// The modification overlaps a change committed after the transaction
    /// took its base snapshot.
    #[error("optimistic lock failure on {path}")]
    Conflict {
        /// Conflicting data path.
        path: String,
    },

    /// The modification does not conform to the mount point's schema.
    #[error("schema validation failed for {path}: {reason}")]
    Validation {
        /// Offending data path.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A path segment traverses a non-container value.
    #[error("path {0} traverses a leaf value")]
    NotTraversable(String),

    /// The cohort voted not to commit without a more detailed cause.
    #[error("can-commit rejected for store {0}, no detailed cause available")]
    Rejected(String),

    /// The cohort was driven out of order (e.g. commit before pre-commit).
    #[error("cohort for store {store} is not prepared for {operation}")]
    NotPrepared {
        /// Store name.
        store: String,
        /// Operation attempted.
        operation: &'static str,
    },

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Internal(String),
}

/// Failure surfaced to a transaction caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransactionError {
    /// The transaction was used in violation of its contract.
    #[error("illegal transaction state: {0}")]
    IllegalState(String),

    /// The supplied data path cannot be used for this operation.
    #[error("invalid data path: {0}")]
    InvalidPath(String),

    /// A three-phase commit phase failed. Always carries the original cause,
    /// never a failure raised while aborting.
    #[error("{phase} failed: {cause}")]
    PhaseFailure {
        /// Phase that failed.
        phase: CommitPhase,
        /// Original triggering failure.
        #[source]
        cause: StoreError,
    },

    /// Reading from or staging into the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The commit task ended without delivering a result.
    #[error("commit result was never delivered")]
    Abandoned,
}

impl TransactionError {
    /// Returns the commit phase if this is a phase failure.
    #[must_use]
    pub const fn phase(&self) -> Option<CommitPhase> {
        match self {
            Self::PhaseFailure { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Failure while releasing a resource owned by a mount point.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// The endpoint was no longer registered under its path.
    #[error("mount point {0} is not registered")]
    NotRegistered(String),

    /// A change-listener task had already terminated abnormally.
    #[error("listener {name} terminated abnormally: {reason}")]
    ListenerTerminated {
        /// Registration name.
        name: String,
        /// Join failure description.
        reason: String,
    },
}

/// Failure to bring a mount point up.
#[derive(Debug, thiserror::Error)]
pub enum MountPointError {
    /// The topology node advertised no capabilities.
    #[error("cached mount point {0} has no capabilities")]
    NoCapabilities(NodeId),

    /// The schema could not be resolved.
    #[error("schema resolution failed for {node_id}: {source}")]
    Schema {
        /// Node whose schema failed.
        node_id: NodeId,
        /// Underlying resolution error.
        #[source]
        source: SchemaResolutionError,
    },

    /// Another endpoint already occupies the mount path.
    #[error("a mount point is already registered at {0}")]
    AlreadyRegistered(String),
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "mount point not found: device-1",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP-facing error enum with status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 4000–4999 | Transaction     | 409 Conflict / 422           |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No active mount point for the given node.
    #[error("mount point not found: {0}")]
    MountPointNotFound(String),

    /// No topology node with the given identifier.
    #[error("topology node not found: {0}")]
    TopologyNodeNotFound(String),

    /// No data at the requested path.
    #[error("no data at {0}")]
    DataNotFound(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown store kind in the request path.
    #[error("invalid store kind: {0}")]
    InvalidStoreKind(String),

    /// Transaction pipeline failure.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidStoreKind(_) => 1002,
            Self::Transaction(TransactionError::InvalidPath(_)) => 1003,
            Self::MountPointNotFound(_) => 2001,
            Self::TopologyNodeNotFound(_) => 2002,
            Self::DataNotFound(_) => 2003,
            Self::Transaction(TransactionError::IllegalState(_)) => 2004,
            Self::Internal(_) => 3000,
            Self::Transaction(TransactionError::Abandoned) => 3001,
            Self::Transaction(TransactionError::Store(_)) => 3002,
            Self::Transaction(TransactionError::PhaseFailure { phase, .. }) => match phase {
                CommitPhase::CanCommit => 4001,
                CommitPhase::PreCommit => 4002,
                CommitPhase::Commit => 4003,
            },
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidStoreKind(_)
            | Self::Transaction(TransactionError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            Self::MountPointNotFound(_) | Self::TopologyNodeNotFound(_) | Self::DataNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Transaction(TransactionError::IllegalState(_)) => StatusCode::CONFLICT,
            Self::Transaction(TransactionError::PhaseFailure { cause, .. }) => match cause {
                StoreError::Validation { .. } | StoreError::NotTraversable(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::CONFLICT,
            },
            Self::Internal(_)
            | Self::Transaction(TransactionError::Abandoned | TransactionError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::Transaction(TransactionError::PhaseFailure { phase, .. }) => {
                Some(format!("phase={phase}"))
            }
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_failure_maps_to_conflict() {
        let err = ApiError::Transaction(TransactionError::PhaseFailure {
            phase: CommitPhase::CanCommit,
            cause: StoreError::Conflict {
                path: "interfaces".to_string(),
            },
        });
        assert_eq!(err.error_code(), 4001);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_failure_is_unprocessable() {
        let err = ApiError::Transaction(TransactionError::PhaseFailure {
            phase: CommitPhase::PreCommit,
            cause: StoreError::Validation {
                path: "bogus".to_string(),
                reason: "unknown data node".to_string(),
            },
        });
        assert_eq!(err.error_code(), 4002);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn not_found_variants_are_404() {
        assert_eq!(
            ApiError::MountPointNotFound("d1".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::DataNotFound("a/b".to_string()).error_code(),
            2003
        );
    }

    #[test]
    fn phase_accessor() {
        let err = TransactionError::PhaseFailure {
            phase: CommitPhase::Commit,
            cause: StoreError::Internal("boom".to_string()),
        };
        assert_eq!(err.phase(), Some(CommitPhase::Commit));
        assert_eq!(TransactionError::Abandoned.phase(), None);
    }
}
