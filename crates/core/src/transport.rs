use serde::Serialize;
use tracing::{debug, info, warn};

use s3guard_policy::{Assessment, BucketPolicy, PolicyError, PolicyTemplates};

use crate::{Bucket, CheckError, Storage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransportOutcome {
    /// A statement already denies non-TLS requests.
    AlreadyEnforced { sid: Option<String> },
    /// Statements all carry other `Bool` conditions, or there are none; nothing written.
    NoAction,
    /// The rendered statement was already in the policy; nothing written.
    DuplicateSkipped,
    /// The append template was added to the existing policy.
    Appended,
    /// The bucket had no policy; the full template was attached.
    Created,
}

impl TransportOutcome {
    pub fn wrote(&self) -> bool { matches!(self, TransportOutcome::Appended | TransportOutcome::Created) }
}

/// Make sure the bucket policy restricts access to secure transport.
///
/// Existing policies are only ever appended to. A fresh policy is created only when the
/// provider reports that none exists; any other fetch error fails the bucket.
pub async fn ensure_secure_transport(
    storage: &dyn Storage,
    templates: &PolicyTemplates,
    strict_effect: bool,
    bucket: &Bucket,
) -> Result<TransportOutcome, CheckError> {
    let name = bucket.name.as_str();
    let policy_error = |source: PolicyError| CheckError::Policy { bucket: name.to_string(), source };

    let text = match storage.get_bucket_policy(name).await {
        Ok(text) => text,
        Err(e) if e.is_not_found() => {
            warn!(bucket = name, "no policy found, attaching one now");
            let policy = templates.full.render_object(name).map_err(policy_error)?;
            let policy = serde_json::to_string(&policy).map_err(|e| policy_error(PolicyError::Serialize(e)))?;
            debug!(bucket = name, %policy, "rendered policy");
            storage.put_bucket_policy(name, &policy).await?;
            warn!(bucket = name, "secure transport policy attached");
            return Ok(TransportOutcome::Created);
        }
        Err(e) => return Err(e.into()),
    };

    let mut policy = BucketPolicy::parse(&text).map_err(policy_error)?;
    match policy.assess(strict_effect) {
        Assessment::Enforced { sid, deny } => {
            if !deny {
                warn!(bucket = name, sid = ?sid, "secure transport condition found on a non-Deny statement");
            }
            warn!(bucket = name, sid = ?sid, "secure transport already enabled");
            Ok(TransportOutcome::AlreadyEnforced { sid })
        }
        assessment @ Assessment::NotEnforced { .. } if !assessment.needs_statement() => {
            info!(bucket = name, "no unconditioned statements, leaving policy unchanged");
            Ok(TransportOutcome::NoAction)
        }
        Assessment::NotEnforced { unconditioned, .. } => {
            let statement = templates.append.render_object(name).map_err(policy_error)?;
            if policy.contains_statement(&statement) {
                warn!(bucket = name, "secure transport statement already present, skipping append");
                return Ok(TransportOutcome::DuplicateSkipped);
            }
            info!(bucket = name, unconditioned, "policy found, enabling secure transport");
            debug!(bucket = name, current = %text, "current policy");
            policy.append_statement(statement);
            let merged = policy.to_json_string().map_err(policy_error)?;
            debug!(bucket = name, policy = %merged, "merged policy");
            storage.put_bucket_policy(name, &merged).await?;
            Ok(TransportOutcome::Appended)
        }
    }
}
