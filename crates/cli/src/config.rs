use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use s3guard_aws::AwsSettings;
use s3guard_core::FailurePolicy;

/// Contents of the YAML settings file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub aws: AwsSettings,
    pub templates: TemplatePaths,
    pub transport: TransportSettings,
    pub failure_policy: FailurePolicy,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatePaths { pub full: Option<PathBuf>, pub append: Option<PathBuf> }

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSettings { pub strict_effect: bool }

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        let raw = std::fs::read(path).with_context(|| format!("read settings {}", path.display()))?;
        let mut settings: Settings = serde_yaml::from_slice(&raw)
            .with_context(|| format!("parse settings {}", path.display()))?;

        // paths in the file are relative to the file
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for p in [&mut settings.templates.full, &mut settings.templates.append, &mut settings.report] {
            if let Some(rel) = p.as_mut().filter(|p| p.is_relative()) {
                *rel = base.join(&*rel);
            }
        }
        Ok(settings)
    }
}
