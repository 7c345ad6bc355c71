//! In-memory [`Storage`] that records every write.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::{Bucket, EncryptionRule, ErrorKind, Storage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Write {
    Encryption { bucket: String, rule: EncryptionRule },
    Policy { bucket: String, policy: String },
}

#[derive(Default)]
pub(crate) struct FakeStorage {
    buckets: Vec<Bucket>,
    list_error: Option<ErrorKind>,
    // bucket -> default rule; absent key means no configuration
    encryption: HashMap<String, Option<EncryptionRule>>,
    policies: Mutex<HashMap<String, String>>,
    failures: HashMap<(String, &'static str), ErrorKind>,
    writes: Mutex<Vec<Write>>,
}

impl FakeStorage {
    pub(crate) fn new<const N: usize>(names: [&str; N]) -> Self {
        Self { buckets: names.iter().map(|n| Bucket::new(*n)).collect(), ..Default::default() }
    }

    pub(crate) fn with_encryption(mut self, bucket: &str, algorithm: Option<&str>) -> Self {
        let rule = algorithm.map(|a| EncryptionRule { algorithm: a.to_string(), kms_key_id: None });
        self.encryption.insert(bucket.to_string(), rule);
        self
    }

    pub(crate) fn with_policy(self, bucket: &str, policy: serde_json::Value) -> Self {
        self.policies.lock().unwrap().insert(bucket.to_string(), policy.to_string());
        self
    }

    pub(crate) fn fail(mut self, bucket: &str, operation: &'static str, kind: ErrorKind) -> Self {
        self.failures.insert((bucket.to_string(), operation), kind);
        self
    }

    pub(crate) fn fail_listing(mut self, kind: ErrorKind) -> Self {
        self.list_error = Some(kind);
        self
    }

    pub(crate) fn writes(&self) -> Vec<Write> { self.writes.lock().unwrap().clone() }

    pub(crate) fn policy_writes(&self, bucket: &str) -> Vec<serde_json::Value> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                Write::Policy { bucket: b, policy } if b == bucket => Some(serde_json::from_str(&policy).unwrap()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn written_buckets(&self) -> HashSet<String> {
        self.writes()
            .into_iter()
            .map(|w| match w { Write::Encryption { bucket, .. } | Write::Policy { bucket, .. } => bucket })
            .collect()
    }

    fn check(&self, bucket: &str, operation: &'static str) -> Result<(), StorageError> {
        match self.failures.get(&(bucket.to_string(), operation)) {
            Some(kind) => Err(StorageError::new(*kind, operation, "simulated failure").with_bucket(bucket)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError> {
        match self.list_error {
            Some(kind) => Err(StorageError::new(kind, "list_buckets", "simulated failure")),
            None => Ok(self.buckets.clone()),
        }
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> Result<Option<EncryptionRule>, StorageError> {
        self.check(bucket, "get_bucket_encryption")?;
        self.encryption.get(bucket).cloned().ok_or_else(|| {
            StorageError::new(ErrorKind::NotFound, "get_bucket_encryption", "no encryption configuration")
                .with_bucket(bucket)
        })
    }

    async fn put_bucket_encryption(&self, bucket: &str, rule: &EncryptionRule) -> Result<(), StorageError> {
        self.check(bucket, "put_bucket_encryption")?;
        self.writes.lock().unwrap().push(Write::Encryption { bucket: bucket.to_string(), rule: rule.clone() });
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<String, StorageError> {
        self.check(bucket, "get_bucket_policy")?;
        self.policies.lock().unwrap().get(bucket).cloned().ok_or_else(|| {
            StorageError::new(ErrorKind::NotFound, "get_bucket_policy", "no policy").with_bucket(bucket)
        })
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError> {
        self.check(bucket, "put_bucket_policy")?;
        self.policies.lock().unwrap().insert(bucket.to_string(), policy.to_string());
        self.writes.lock().unwrap().push(Write::Policy { bucket: bucket.to_string(), policy: policy.to_string() });
        Ok(())
    }
}
