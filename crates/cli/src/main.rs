use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use s3guard_aws::S3Storage;
use s3guard_core::{AuditOptions, Auditor, FailurePolicy, Report};
use s3guard_policy::PolicyTemplates;

mod config;

use config::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about="Enforce default encryption and TLS-only bucket policies across S3 buckets")]
struct Cli {
    /// Settings file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    region: Option<String>,

    /// Named AWS profile
    #[arg(long)]
    profile: Option<String>,

    /// S3-compatible endpoint
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Policy template for buckets with no policy
    #[arg(long)]
    full_template: Option<PathBuf>,

    /// Statement template appended to existing policies
    #[arg(long)]
    append_template: Option<PathBuf>,

    /// Only Deny statements count as enforcing secure transport
    #[arg(long, default_value_t=false)]
    strict_effect: bool,

    /// Stop at the first bucket that fails
    #[arg(long, default_value_t=false)]
    fail_fast: bool,

    /// Write the run report here as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t=LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum LogFormat { Text, Json }

/// Command-line flags win over the settings file.
fn merge(mut s: Settings, cli: &Cli) -> Settings {
    s.aws.region = cli.region.clone().or(s.aws.region);
    s.aws.profile = cli.profile.clone().or(s.aws.profile);
    s.aws.endpoint_url = cli.endpoint_url.clone().or(s.aws.endpoint_url);
    s.templates.full = cli.full_template.clone().or(s.templates.full);
    s.templates.append = cli.append_template.clone().or(s.templates.append);
    s.report = cli.report.clone().or(s.report);
    if cli.strict_effect { s.transport.strict_effect = true; }
    if cli.fail_fast { s.failure_policy = FailurePolicy::Abort; }
    s
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("write report {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

async fn run(cli: Cli) -> Result<Report> {
    let settings = merge(Settings::load(cli.config.as_deref())?, &cli);
    let templates = PolicyTemplates::load(settings.templates.full.as_deref(), settings.templates.append.as_deref())
        .context("load policy templates")?;
    let storage = S3Storage::from_settings(&settings.aws).await;
    let options = AuditOptions {
        failure_policy: settings.failure_policy,
        strict_effect: settings.transport.strict_effect,
    };

    let report = Auditor::new(&storage, &templates, options).run().await?;
    if let Some(path) = &settings.report {
        write_report(&report, path)?;
    }
    Ok(report)
}

/// 0 when every check passed, 2 when some bucket failed, 1 when the run itself failed.
fn exit_status(outcome: &Result<Report>) -> u8 {
    match outcome {
        Ok(report) if report.has_failures() => 2,
        Ok(_) => 0,
        Err(e) => {
            error!("run aborted: {e:#}");
            1
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    ExitCode::from(exit_status(&run(cli).await))
}
