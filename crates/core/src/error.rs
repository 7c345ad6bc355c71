use serde::Serialize;
use std::fmt;
use thiserror::Error;

use s3guard_policy::PolicyError;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad categories of storage API failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// The requested configuration (encryption rule, policy) does not exist.
    NotFound,
    AccessDenied,
    /// Any other error the service answered with.
    Service,
    /// No service answer: dispatch, timeout or connection failure.
    Transport,
    /// The service answered with something we could not interpret.
    InvalidResponse,
    /// The request could not be built from the given input.
    InvalidInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::AccessDenied => write!(f, "access denied"),
            ErrorKind::Service => write!(f, "service error"),
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::InvalidResponse => write!(f, "invalid response"),
            ErrorKind::InvalidInput => write!(f, "invalid input"),
        }
    }
}

/// Error returned by a [`Storage`](crate::Storage) implementation.
#[derive(Debug)]
pub struct StorageError {
    kind: ErrorKind,
    operation: &'static str,
    bucket: Option<String>,
    message: Option<String>,
    source: BoxError,
}

impl StorageError {
    pub fn new<E>(kind: ErrorKind, operation: &'static str, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self { kind, operation, bucket: None, message: None, source: err.into() }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Provider detail (error code and message) shown alongside the kind.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn operation(&self) -> &'static str { self.operation }
    pub fn bucket(&self) -> Option<&str> { self.bucket.as_deref() }
    pub fn is_not_found(&self) -> bool { self.kind == ErrorKind::NotFound }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.operation)?;
        if let Some(bucket) = &self.bucket {
            write!(f, " for bucket '{bucket}'")?;
        }
        write!(f, ": {}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Failure of a single bucket check.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("bucket '{bucket}': {source}")]
    Policy { bucket: String, #[source] source: PolicyError },
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("listing buckets")]
    List(#[source] StorageError),
    #[error("{check} check aborted at bucket '{bucket}'")]
    Aborted { check: &'static str, bucket: String, #[source] source: CheckError },
}
