use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod audit;
mod encryption;
mod error;
mod transport;

#[cfg(test)]
mod fake;

pub use audit::{Auditor, AuditOptions, BucketReport, CheckStatus, FailurePolicy, Report, Summary};
pub use encryption::{ensure_encryption, EncryptionOutcome};
pub use error::{AuditError, BoxError, CheckError, ErrorKind, StorageError};
pub use transport::{ensure_secure_transport, TransportOutcome};

/// Algorithm applied to buckets without default encryption.
pub const DEFAULT_SSE_ALGORITHM: &str = "AES256";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket { pub name: String }

impl Bucket {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

/// The `ApplyServerSideEncryptionByDefault` part of a bucket's encryption rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionRule {
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

impl EncryptionRule {
    pub fn aes256() -> Self { Self { algorithm: DEFAULT_SSE_ALGORITHM.to_string(), kms_key_id: None } }
    pub fn is_empty(&self) -> bool { self.algorithm.trim().is_empty() }
}

/// Control-plane operations used against the object store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// A single page of buckets, in provider order.
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError>;
    /// `Ok(None)` when a configuration exists without a default rule;
    /// [`ErrorKind::NotFound`] when the bucket has no configuration at all.
    async fn get_bucket_encryption(&self, bucket: &str) -> Result<Option<EncryptionRule>, StorageError>;
    async fn put_bucket_encryption(&self, bucket: &str, rule: &EncryptionRule) -> Result<(), StorageError>;
    /// Raw policy JSON; [`ErrorKind::NotFound`] when the bucket has no policy.
    async fn get_bucket_policy(&self, bucket: &str) -> Result<String, StorageError>;
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError>;
}
