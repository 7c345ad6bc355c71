use serde::{Deserialize, Serialize};
use tracing::{error, info};

use s3guard_policy::PolicyTemplates;

use crate::{ensure_encryption, ensure_secure_transport, AuditError, Bucket, CheckError, EncryptionOutcome, Storage, TransportOutcome};

/// What to do when a single bucket check fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, record it in the report and move on to the next bucket.
    #[default]
    Continue,
    /// Stop the whole run at the first failure.
    Abort,
}

#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    pub failure_policy: FailurePolicy,
    /// Only `Deny` statements count as enforcing secure transport.
    pub strict_effect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus<T> {
    Ok(T),
    Failed { error: String },
    /// Not reached because the run was aborted.
    Skipped,
}

impl<T> CheckStatus<T> {
    pub fn is_failed(&self) -> bool { matches!(self, CheckStatus::Failed { .. }) }
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketReport {
    pub bucket: String,
    pub encryption: CheckStatus<EncryptionOutcome>,
    pub transport: CheckStatus<TransportOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary { pub buckets: usize, pub writes: usize, pub failures: usize }

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report { pub buckets: Vec<BucketReport> }

impl Report {
    pub fn summary(&self) -> Summary {
        let mut s = Summary { buckets: self.buckets.len(), ..Default::default() };
        for b in &self.buckets {
            match &b.encryption {
                CheckStatus::Ok(o) if o.wrote() => s.writes += 1,
                CheckStatus::Failed { .. } => s.failures += 1,
                _ => {}
            }
            match &b.transport {
                CheckStatus::Ok(o) if o.wrote() => s.writes += 1,
                CheckStatus::Failed { .. } => s.failures += 1,
                _ => {}
            }
        }
        s
    }

    pub fn has_failures(&self) -> bool {
        self.buckets.iter().any(|b| b.encryption.is_failed() || b.transport.is_failed())
    }
}

/// Lists buckets once, then runs the encryption pass followed by the transport pass.
pub struct Auditor<'a> {
    storage: &'a dyn Storage,
    templates: &'a PolicyTemplates,
    options: AuditOptions,
}

impl<'a> Auditor<'a> {
    pub fn new(storage: &'a dyn Storage, templates: &'a PolicyTemplates, options: AuditOptions) -> Self {
        Self { storage, templates, options }
    }

    pub async fn run(&self) -> Result<Report, AuditError> {
        let buckets = self.storage.list_buckets().await.map_err(AuditError::List)?;
        info!(count = buckets.len(), "buckets listed");
        let mut report = Report {
            buckets: buckets
                .iter()
                .map(|b| BucketReport { bucket: b.name.clone(), encryption: CheckStatus::Skipped, transport: CheckStatus::Skipped })
                .collect(),
        };

        info!("checking S3 SSE configuration");
        for (bucket, entry) in buckets.iter().zip(report.buckets.iter_mut()) {
            let result = ensure_encryption(self.storage, bucket).await.map_err(CheckError::from);
            entry.encryption = self.settle("encryption", bucket, result)?;
        }

        info!("checking secure transport");
        for (bucket, entry) in buckets.iter().zip(report.buckets.iter_mut()) {
            let result = ensure_secure_transport(self.storage, self.templates, self.options.strict_effect, bucket).await;
            entry.transport = self.settle("transport", bucket, result)?;
        }

        let summary = report.summary();
        info!(buckets = summary.buckets, writes = summary.writes, failures = summary.failures, "audit complete");
        Ok(report)
    }

    fn settle<T>(&self, check: &'static str, bucket: &Bucket, result: Result<T, CheckError>) -> Result<CheckStatus<T>, AuditError> {
        match result {
            Ok(outcome) => Ok(CheckStatus::Ok(outcome)),
            Err(e) => {
                error!(bucket = %bucket.name, check, error = %e, "bucket check failed");
                match self.options.failure_policy {
                    FailurePolicy::Continue => Ok(CheckStatus::Failed { error: e.to_string() }),
                    FailurePolicy::Abort => Err(AuditError::Aborted { check, bucket: bucket.name.clone(), source: e }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeStorage, Write};
    use crate::{EncryptionRule, ErrorKind};
    use serde_json::json;

    async fn audit(storage: &FakeStorage, options: AuditOptions) -> Result<Report, AuditError> {
        let templates = PolicyTemplates::builtin();
        Auditor::new(storage, &templates, options).run().await
    }

    #[tokio::test]
    async fn unconfigured_bucket_gets_two_writes() {
        let storage = FakeStorage::new(["logs-bucket"]);
        let report = audit(&storage, AuditOptions::default()).await.unwrap();

        let writes = storage.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], Write::Encryption { bucket: "logs-bucket".into(), rule: EncryptionRule::aes256() });
        let Write::Policy { policy, .. } = &writes[1] else { panic!("expected policy write") };
        assert!(policy.contains("arn:aws:s3:::logs-bucket"));
        assert_eq!(report.summary(), Summary { buckets: 1, writes: 2, failures: 0 });
    }

    #[tokio::test]
    async fn compliant_bucket_gets_no_writes() {
        let storage = FakeStorage::new(["app-bucket"]).with_encryption("app-bucket", Some("AES256")).with_policy(
            "app-bucket",
            json!({"Version":"2012-10-17","Statement":[
                {"Effect":"Deny","Principal":"*","Action":"s3:*","Condition":{"Bool":{"aws:SecureTransport":"false"}}}
            ]}),
        );
        let report = audit(&storage, AuditOptions::default()).await.unwrap();
        assert!(storage.writes().is_empty());
        assert!(!report.has_failures());
        assert_eq!(report.buckets[0].encryption, CheckStatus::Ok(EncryptionOutcome::AlreadyEnabled { algorithm: "AES256".into() }));
        assert_eq!(report.buckets[0].transport, CheckStatus::Ok(TransportOutcome::AlreadyEnforced { sid: None }));
    }

    #[tokio::test]
    async fn failures_are_isolated_per_bucket() {
        let storage = FakeStorage::new(["a", "broken", "c"])
            .fail("broken", "get_bucket_encryption", ErrorKind::AccessDenied)
            .fail("broken", "get_bucket_policy", ErrorKind::AccessDenied);
        let report = audit(&storage, AuditOptions::default()).await.unwrap();

        assert!(report.has_failures());
        assert!(report.buckets[1].encryption.is_failed());
        assert!(report.buckets[1].transport.is_failed());
        let written = storage.written_buckets();
        assert!(written.contains("a") && written.contains("c") && !written.contains("broken"));
        assert_eq!(report.summary(), Summary { buckets: 3, writes: 4, failures: 2 });
    }

    #[tokio::test]
    async fn abort_policy_stops_at_first_failure() {
        let storage = FakeStorage::new(["a", "broken", "c"]).fail("broken", "get_bucket_encryption", ErrorKind::Service);
        let options = AuditOptions { failure_policy: FailurePolicy::Abort, ..Default::default() };
        let err = audit(&storage, options).await.unwrap_err();

        assert!(matches!(err, AuditError::Aborted { check: "encryption", ref bucket, .. } if bucket == "broken"));
        assert_eq!(storage.written_buckets().into_iter().collect::<Vec<_>>(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn encryption_pass_runs_before_transport_pass() {
        let storage = FakeStorage::new(["a", "b"]);
        audit(&storage, AuditOptions::default()).await.unwrap();
        let kinds: Vec<_> = storage
            .writes()
            .into_iter()
            .map(|w| match w { Write::Encryption { bucket, .. } => format!("enc:{bucket}"), Write::Policy { bucket, .. } => format!("pol:{bucket}") })
            .collect();
        assert_eq!(kinds, ["enc:a", "enc:b", "pol:a", "pol:b"]);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let storage = FakeStorage::new(["a"]).fail_listing(ErrorKind::Transport);
        assert!(matches!(audit(&storage, AuditOptions::default()).await, Err(AuditError::List(_))));
        assert!(storage.writes().is_empty());
    }

    #[tokio::test]
    async fn report_serializes_statuses() {
        let storage = FakeStorage::new(["b"]).fail("b", "get_bucket_policy", ErrorKind::AccessDenied);
        let report = audit(&storage, AuditOptions::default()).await.unwrap();
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["buckets"][0]["bucket"], "b");
        assert_eq!(v["buckets"][0]["encryption"]["status"], "ok");
        assert_eq!(v["buckets"][0]["encryption"]["outcome"], "applied");
        assert_eq!(v["buckets"][0]["transport"]["status"], "failed");
    }
}
