use serde::Serialize;
use tracing::{info, warn};

use crate::{Bucket, EncryptionRule, Storage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EncryptionOutcome {
    AlreadyEnabled { algorithm: String },
    Applied { algorithm: String },
}

impl EncryptionOutcome {
    pub fn wrote(&self) -> bool { matches!(self, EncryptionOutcome::Applied { .. }) }
}

/// Make sure `bucket` has a default server-side encryption rule, applying AES256 if not.
///
/// A bucket without any encryption configuration is reported by most providers as a
/// not-found error; that is treated the same as an empty rule.
pub async fn ensure_encryption(storage: &dyn Storage, bucket: &Bucket) -> Result<EncryptionOutcome, StorageError> {
    let current = match storage.get_bucket_encryption(&bucket.name).await {
        Ok(rule) => rule.filter(|r| !r.is_empty()),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    if let Some(rule) = current {
        warn!(bucket = %bucket.name, algorithm = %rule.algorithm, "SSE already enabled");
        return Ok(EncryptionOutcome::AlreadyEnabled { algorithm: rule.algorithm });
    }

    let rule = EncryptionRule::aes256();
    info!(bucket = %bucket.name, "enabling SSE");
    storage.put_bucket_encryption(&bucket.name, &rule).await?;
    info!(bucket = %bucket.name, algorithm = %rule.algorithm, "SSE applied");
    Ok(EncryptionOutcome::Applied { algorithm: rule.algorithm })
}
