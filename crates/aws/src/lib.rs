use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{ServerSideEncryption, ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration, ServerSideEncryptionRule};
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use s3guard_core::{Bucket, EncryptionRule, ErrorKind, Storage, StorageError};

/// S3 error code for a bucket that has never had default encryption configured.
pub const ENCRYPTION_NOT_FOUND: &str = "ServerSideEncryptionConfigurationNotFoundError";
/// S3 error code for a bucket without a policy.
pub const POLICY_NOT_FOUND: &str = "NoSuchBucketPolicy";

/// Where and as whom to talk to S3. Unset fields fall back to the default provider chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// For S3-compatible endpoints; forces path-style addressing.
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct S3Storage { client: Client }

impl S3Storage {
    pub fn new(client: Client) -> Self { Self { client } }

    pub async fn from_settings(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region { loader = loader.region(Region::new(region.clone())); }
        if let Some(profile) = &settings.profile { loader = loader.profile_name(profile); }
        let shared = loader.load().await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = &settings.endpoint_url {
            config = config.endpoint_url(url).force_path_style(true);
        }
        debug!(region = ?shared.region(), endpoint = ?settings.endpoint_url, "S3 client configured");
        Self::new(Client::from_conf(config.build()))
    }
}

/// Map an SDK failure onto the storage taxonomy. Only the codes in `not_found`
/// count as [`ErrorKind::NotFound`]; `NoSuchBucket` in particular does not.
fn storage_error<E, R>(operation: &'static str, bucket: Option<&str>, not_found: &[&str], err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let service = err.as_service_error();
    let code = service.and_then(|e| e.code());
    let kind = match code {
        Some(code) if not_found.contains(&code) => ErrorKind::NotFound,
        Some("AccessDenied" | "AllAccessDisabled") => ErrorKind::AccessDenied,
        Some(_) => ErrorKind::Service,
        None => match &err {
            SdkError::ServiceError(_) => ErrorKind::Service,
            SdkError::ResponseError(_) => ErrorKind::InvalidResponse,
            _ => ErrorKind::Transport,
        },
    };
    let message = match (code, service.and_then(|e| e.message())) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(&err).to_string(),
    };
    let e = StorageError::new(kind, operation, err).with_message(message);
    match bucket {
        Some(b) => e.with_bucket(b),
        None => e,
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError> {
        let out = self.client.list_buckets().send().await
            .map_err(|e| storage_error("list_buckets", None, &[], e))?;
        Ok(out.buckets().iter().filter_map(|b| b.name()).map(Bucket::new).collect())
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> Result<Option<EncryptionRule>, StorageError> {
        let out = self.client.get_bucket_encryption().bucket(bucket).send().await
            .map_err(|e| storage_error("get_bucket_encryption", Some(bucket), &[ENCRYPTION_NOT_FOUND], e))?;
        let Some(config) = out.server_side_encryption_configuration() else { return Ok(None) };
        let default = config.rules().first().and_then(|r| r.apply_server_side_encryption_by_default());
        Ok(default.map(|d| EncryptionRule {
            algorithm: d.sse_algorithm().as_str().to_string(),
            kms_key_id: d.kms_master_key_id().map(str::to_owned),
        }))
    }

    async fn put_bucket_encryption(&self, bucket: &str, rule: &EncryptionRule) -> Result<(), StorageError> {
        let invalid = |e| StorageError::new(ErrorKind::InvalidInput, "put_bucket_encryption", e).with_bucket(bucket);
        let by_default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::from(rule.algorithm.as_str()))
            .set_kms_master_key_id(rule.kms_key_id.clone())
            .build()
            .map_err(invalid)?;
        let config = ServerSideEncryptionConfiguration::builder()
            .rules(ServerSideEncryptionRule::builder().apply_server_side_encryption_by_default(by_default).build())
            .build()
            .map_err(invalid)?;
        self.client.put_bucket_encryption().bucket(bucket).server_side_encryption_configuration(config).send().await
            .map_err(|e| storage_error("put_bucket_encryption", Some(bucket), &[], e))?;
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<String, StorageError> {
        let out = self.client.get_bucket_policy().bucket(bucket).send().await
            .map_err(|e| storage_error("get_bucket_policy", Some(bucket), &[POLICY_NOT_FOUND], e))?;
        out.policy().map(str::to_owned).ok_or_else(|| {
            StorageError::new(ErrorKind::InvalidResponse, "get_bucket_policy", "response carried no policy document")
                .with_bucket(bucket)
        })
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError> {
        self.client.put_bucket_policy().bucket(bucket).policy(policy).send().await
            .map_err(|e| storage_error("put_bucket_policy", Some(bucket), &[], e))?;
        Ok(())
    }
}
