//! Secure-transport policy templates and bucket-policy analysis.

use std::path::PathBuf;
use thiserror::Error;

mod document;
mod template;

pub use document::{Assessment, BucketPolicy, StatementKind, SECURE_TRANSPORT_KEY};
pub use template::{PolicyTemplates, Template, BUCKET_NAME_VAR};

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("read template {}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("template '{template}' uses unknown variable '{variable}' (only '{}' is supported)", BUCKET_NAME_VAR)]
    UnknownVariable { template: String, variable: String },
    #[error("template '{template}' did not render valid JSON")]
    Render { template: String, #[source] source: serde_json::Error },
    #[error("{0} is not a JSON object")]
    NotAnObject(String),
    #[error("bucket policy is not valid JSON")]
    Parse(#[source] serde_json::Error),
    #[error("serialize bucket policy")]
    Serialize(#[source] serde_json::Error),
}
