use serde_json::{Map as JsonMap, Value as Json};

use crate::PolicyError;

/// Condition key requiring requests to arrive over TLS.
pub const SECURE_TRANSPORT_KEY: &str = "aws:SecureTransport";

/// How a single policy statement relates to secure transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// No `Condition`, or a `Condition` without a `Bool` operator.
    Unconditioned,
    /// `Bool` condition with `aws:SecureTransport` set to false.
    Enforcing { deny: bool },
    /// Some other `Bool` condition.
    OtherBool,
}

impl StatementKind {
    pub fn of(statement: &Json) -> Self {
        let Some(bool_cond) = statement.get("Condition").and_then(|c| c.get("Bool")).and_then(Json::as_object) else {
            return StatementKind::Unconditioned;
        };
        let secure = bool_cond.iter().find(|(k, _)| k.eq_ignore_ascii_case(SECURE_TRANSPORT_KEY)).map(|(_, v)| v);
        match secure {
            Some(v) if is_false(v) => StatementKind::Enforcing {
                deny: statement.get("Effect").and_then(Json::as_str).is_some_and(|e| e.eq_ignore_ascii_case("deny")),
            },
            _ => StatementKind::OtherBool,
        }
    }
}

fn is_false(v: &Json) -> bool {
    match v {
        Json::String(s) => s.eq_ignore_ascii_case("false"),
        Json::Bool(b) => !b,
        Json::Array(items) => !items.is_empty() && items.iter().all(is_false),
        _ => false,
    }
}

/// Result of inspecting a policy for secure-transport enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    Enforced { sid: Option<String>, deny: bool },
    /// `non_deny` counts enforcing statements passed over because of `strict_effect`.
    NotEnforced { unconditioned: usize, non_deny: usize },
}

impl Assessment {
    /// Whether appending the secure-transport statement is warranted. A policy whose
    /// statements all carry some other `Bool` condition, or that has none, is left alone.
    pub fn needs_statement(&self) -> bool {
        matches!(self, Assessment::NotEnforced { unconditioned, non_deny } if unconditioned + non_deny > 0)
    }
}

/// An existing bucket policy. Top-level keys other than `Statement` pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketPolicy(JsonMap<String, Json>);

impl BucketPolicy {
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        match serde_json::from_str(text).map_err(PolicyError::Parse)? {
            Json::Object(map) => Ok(Self(map)),
            _ => Err(PolicyError::NotAnObject("bucket policy".into())),
        }
    }

    /// `Statement` may be an array or, per the IAM grammar, a single object.
    pub fn statements(&self) -> Vec<&Json> {
        match self.0.get("Statement") {
            Some(Json::Array(items)) => items.iter().collect(),
            Some(obj @ Json::Object(_)) => vec![obj],
            _ => Vec::new(),
        }
    }

    /// With `strict_effect`, only `Deny` statements count as enforcing.
    pub fn assess(&self, strict_effect: bool) -> Assessment {
        let (mut unconditioned, mut non_deny) = (0, 0);
        for stmt in self.statements() {
            match StatementKind::of(stmt) {
                StatementKind::Enforcing { deny } if deny || !strict_effect => {
                    let sid = stmt.get("Sid").and_then(Json::as_str).map(str::to_owned);
                    return Assessment::Enforced { sid, deny };
                }
                StatementKind::Enforcing { .. } => non_deny += 1,
                StatementKind::Unconditioned => unconditioned += 1,
                StatementKind::OtherBool => {}
            }
        }
        Assessment::NotEnforced { unconditioned, non_deny }
    }

    pub fn contains_statement(&self, statement: &JsonMap<String, Json>) -> bool {
        self.statements().into_iter().any(|s| s.as_object() == Some(statement))
    }

    pub fn append_statement(&mut self, statement: JsonMap<String, Json>) {
        let entry = self.0.entry("Statement").or_insert_with(|| Json::Array(Vec::new()));
        match entry {
            Json::Array(items) => items.push(Json::Object(statement)),
            other => {
                let existing = std::mem::take(other);
                let mut items = Vec::new();
                if existing.is_object() { items.push(existing); }
                items.push(Json::Object(statement));
                *other = Json::Array(items);
            }
        }
    }

    pub fn to_json_string(&self) -> Result<String, PolicyError> {
        serde_json::to_string(&self.0).map_err(PolicyError::Serialize)
    }
}
