use regex::{NoExpand, Regex};
use serde_json::{Map as JsonMap, Value as Json};
use std::path::Path;
use std::sync::OnceLock;

use crate::PolicyError;

/// The only variable a policy template may reference.
pub const BUCKET_NAME_VAR: &str = "bucket_name";

const FULL_TEMPLATE: &str = include_str!("../templates/sec_trans.json");
const APPEND_TEMPLATE: &str = include_str!("../templates/sec_trans_append.json");

// Name used to test-render templates at load time.
const PROBE_BUCKET: &str = "probe-bucket";

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex"))
}

/// A JSON-producing text template with `{{ bucket_name }}` placeholders.
#[derive(Debug, Clone)]
pub struct Template { name: String, source: String }

impl Template {
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self, PolicyError> {
        let name = name.into();
        let source = source.into();
        if let Some(cap) = placeholder().captures_iter(&source).find(|c| &c[1] != BUCKET_NAME_VAR) {
            return Err(PolicyError::UnknownVariable { template: name, variable: cap[1].to_string() });
        }
        Ok(Self { name, source })
    }

    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| PolicyError::Io { path: path.to_path_buf(), source })?;
        Self::parse(path.display().to_string(), source)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn render(&self, bucket_name: &str) -> String {
        placeholder().replace_all(&self.source, NoExpand(bucket_name)).into_owned()
    }

    /// Render and parse; the result must be a JSON object.
    pub fn render_object(&self, bucket_name: &str) -> Result<JsonMap<String, Json>, PolicyError> {
        let rendered = self.render(bucket_name);
        match serde_json::from_str(&rendered) {
            Ok(Json::Object(map)) => Ok(map),
            Ok(_) => Err(PolicyError::NotAnObject(format!("template '{}'", self.name))),
            Err(source) => Err(PolicyError::Render { template: self.name.clone(), source }),
        }
    }
}

/// The two templates the transport check renders per bucket: a whole policy for
/// buckets without one, and a single statement appended to an existing policy.
#[derive(Debug, Clone)]
pub struct PolicyTemplates { pub full: Template, pub append: Template }

impl PolicyTemplates {
    pub fn builtin() -> Self {
        Self {
            full: Template { name: "builtin:sec_trans.json".into(), source: FULL_TEMPLATE.into() },
            append: Template { name: "builtin:sec_trans_append.json".into(), source: APPEND_TEMPLATE.into() },
        }
    }

    /// Load templates once, falling back to the built-in ones, and check that both render.
    pub fn load(full: Option<&Path>, append: Option<&Path>) -> Result<Self, PolicyError> {
        let builtin = Self::builtin();
        let templates = Self {
            full: full.map(Template::from_file).transpose()?.unwrap_or(builtin.full),
            append: append.map(Template::from_file).transpose()?.unwrap_or(builtin.append),
        };
        templates.full.render_object(PROBE_BUCKET)?;
        templates.append.render_object(PROBE_BUCKET)?;
        Ok(templates)
    }
}

impl Default for PolicyTemplates {
    fn default() -> Self { Self::builtin() }
}
