//! Data-permission rule compilation and evaluation.
//!
//! A data permission stores its rules as a JSON array of attributes:
//!
//! ```json
//! [{"field": "dept_id", "value": [1, 2], "match": "in", "exclude": false}]
//! ```
//!
//! [`compile_rules`] turns that array into [`Condition`]s; a [`RuleSet`]
//! combines them with the permission's [`DataPermissionMode`] and can be
//! evaluated against a JSON row.

use std::cmp::Ordering;
use std::net::IpAddr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Wildcard value meaning "no restriction".
pub const WILDCARD: &str = "*";

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// How the conditions of one permission are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum DataPermissionMode {
    /// Any condition may match.
    #[default]
    Or,
    /// Every condition must match.
    And,
}

impl DataPermissionMode {
    pub const ALL: [DataPermissionMode; 2] = [DataPermissionMode::Or, DataPermissionMode::And];

    /// Stored column value.
    pub fn code(self) -> i16 {
        match self {
            DataPermissionMode::Or => 0,
            DataPermissionMode::And => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DataPermissionMode::Or => "OR",
            DataPermissionMode::And => "AND",
        }
    }
}

impl TryFrom<i16> for DataPermissionMode {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DataPermissionMode::Or),
            1 => Ok(DataPermissionMode::And),
            other => Err(CoreError::Validation(format!(
                "Invalid mode_type {other}. Must be 0 (OR) or 1 (AND)"
            ))),
        }
    }
}

impl From<DataPermissionMode> for i16 {
    fn from(mode: DataPermissionMode) -> Self {
        mode.code()
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Gte,
    Lte,
    Ne,
}

impl CompareOp {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "contains" => CompareOp::Contains,
            "startswith" => CompareOp::StartsWith,
            "endswith" => CompareOp::EndsWith,
            "gt" => CompareOp::Gt,
            "lt" => CompareOp::Lt,
            "gte" => CompareOp::Gte,
            "lte" => CompareOp::Lte,
            "ne" => CompareOp::Ne,
            _ => return None,
        })
    }
}

/// One way an IP address may satisfy an `ip_in` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpMatcher {
    Network { base: IpAddr, prefix: u8 },
    Range { start: IpAddr, end: IpAddr },
    Exact(String),
    Prefix(String),
}

impl IpMatcher {
    /// Parse one entry: `a.b.c.d/nn`, `start-end`, a full IPv4 address, or a
    /// textual prefix. Unparsable networks and ranges yield `None`.
    fn parse(entry: &str) -> Option<Self> {
        if let Some((addr, prefix)) = entry.split_once('/') {
            let base: IpAddr = addr.trim().parse().ok()?;
            let prefix: u8 = prefix.trim().parse().ok()?;
            let max = if base.is_ipv4() { 32 } else { 128 };
            return (prefix <= max).then_some(IpMatcher::Network { base, prefix });
        }
        if let Some((start, end)) = entry.split_once('-') {
            let start: IpAddr = start.trim().parse().ok()?;
            let end: IpAddr = end.trim().parse().ok()?;
            return Some(IpMatcher::Range { start, end });
        }
        if entry.split('.').count() == 4 {
            return Some(IpMatcher::Exact(entry.to_string()));
        }
        Some(IpMatcher::Prefix(entry.to_string()))
    }

    fn matches(&self, raw: &str) -> bool {
        match self {
            IpMatcher::Exact(ip) => raw == ip,
            IpMatcher::Prefix(prefix) => raw.starts_with(prefix.as_str()),
            IpMatcher::Network { base, prefix } => raw
                .parse::<IpAddr>()
                .is_ok_and(|ip| in_network(ip, *base, *prefix)),
            IpMatcher::Range { start, end } => raw.parse::<IpAddr>().is_ok_and(|ip| {
                ip.is_ipv4() == start.is_ipv4() && *start <= ip && ip <= *end
            }),
        }
    }
}

fn in_network(ip: IpAddr, base: IpAddr, prefix: u8) -> bool {
    match (ip, base) {
        (IpAddr::V4(ip), IpAddr::V4(base)) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(ip) & mask == u32::from(base) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(base)) => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(ip) & mask == u128::from(base) & mask
        }
        _ => false,
    }
}

/// A single compiled row predicate.
#[derive(Debug, Clone)]
pub enum Condition {
    MatchAll,
    MatchNone,
    Eq { field: String, value: Value },
    Compare { field: String, op: CompareOp, value: Value },
    Regex { field: String, pattern: Regex },
    IsNull { field: String },
    IsNotNull { field: String },
    In { field: String, values: Vec<Value> },
    IpIn { field: String, matchers: Vec<IpMatcher> },
    /// A lookup this crate does not evaluate itself (`{field}__{lookup}`).
    /// It never matches in [`Condition::matches`].
    Lookup { field: String, lookup: String, value: Value },
    Not(Box<Condition>),
}

impl Condition {
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let get = |field: &str| row.get(field).unwrap_or(&Value::Null);
        match self {
            Condition::MatchAll => true,
            Condition::MatchNone => false,
            Condition::Eq { field, value } => loose_eq(get(field), value),
            Condition::Compare { field, op, value } => compare(get(field), *op, value),
            Condition::Regex { field, pattern } => get(field)
                .as_str()
                .is_some_and(|s| pattern.is_match(s)),
            Condition::IsNull { field } => get(field).is_null(),
            Condition::IsNotNull { field } => !get(field).is_null(),
            Condition::In { field, values } => match get(field) {
                Value::Array(items) => items
                    .iter()
                    .any(|item| values.iter().any(|v| loose_eq(item, v))),
                scalar => values.iter().any(|v| loose_eq(scalar, v)),
            },
            Condition::IpIn { field, matchers } => get(field)
                .as_str()
                .is_some_and(|ip| matchers.iter().any(|m| m.matches(ip))),
            Condition::Lookup { .. } => false,
            Condition::Not(inner) => !inner.matches(row),
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Ne => !loose_eq(actual, expected),
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(e)) => match op {
                    CompareOp::Contains => a.contains(e),
                    CompareOp::StartsWith => a.starts_with(e),
                    _ => a.ends_with(e),
                },
                _ => false,
            }
        }
        CompareOp::Gt => order(actual, expected) == Some(Ordering::Greater),
        CompareOp::Lt => order(actual, expected) == Some(Ordering::Less),
        CompareOp::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lte => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Reject a `rules` value that is not a JSON array.
pub fn validate_rules(rules: &Value) -> Result<(), CoreError> {
    if rules.is_array() {
        Ok(())
    } else {
        Err(CoreError::Validation("rules must be a JSON array".into()))
    }
}

fn into_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn has_wildcard(values: &[Value]) -> bool {
    values.iter().any(|v| v.as_str() == Some(WILDCARD))
}

/// Compile a rules array into conditions.
///
/// Entries that are not objects, or that lack `field` or `value`, are
/// skipped. `match` defaults to `eq`. `exclude: true` negates the entry,
/// except for `m2m_all`, which expands into one membership condition per
/// value.
pub fn compile_rules(rules: &Value) -> Result<Vec<Condition>, CoreError> {
    validate_rules(rules)?;
    let entries = rules.as_array().map(Vec::as_slice).unwrap_or_default();

    let mut conditions = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(attr) = entry.as_object() else {
            continue;
        };
        let (Some(field), Some(value)) = (
            attr.get("field").and_then(Value::as_str),
            attr.get("value").filter(|v| !v.is_null()),
        ) else {
            continue;
        };
        let kind = attr.get("match").and_then(Value::as_str).unwrap_or("eq");

        if kind == "m2m_all" {
            conditions.extend(into_list(value).into_iter().map(|v| Condition::In {
                field: field.to_string(),
                values: vec![v],
            }));
            continue;
        }

        let condition = compile_one(field, kind, value);
        let exclude = attr.get("exclude").and_then(Value::as_bool).unwrap_or(false);
        conditions.push(if exclude {
            Condition::Not(Box::new(condition))
        } else {
            condition
        });
    }
    Ok(conditions)
}

fn compile_one(field: &str, kind: &str, value: &Value) -> Condition {
    let field = field.to_string();
    if kind == "all" {
        return Condition::MatchAll;
    }
    if let Some(op) = CompareOp::parse(kind) {
        return Condition::Compare {
            field,
            op,
            value: value.clone(),
        };
    }
    match kind {
        "eq" => Condition::Eq {
            field,
            value: value.clone(),
        },
        "regex" => match value.as_str().map(Regex::new) {
            Some(Ok(pattern)) => Condition::Regex { field, pattern },
            _ => Condition::MatchNone,
        },
        "isnull" | "is" => Condition::IsNull { field },
        "is_not" => Condition::IsNotNull { field },
        "ip_in" => compile_ip_in(field, value),
        "in" => {
            let values = into_list(value);
            if has_wildcard(&values) {
                Condition::MatchAll
            } else {
                Condition::In { field, values }
            }
        }
        m2m if m2m.starts_with("m2m") => Condition::In {
            field,
            values: into_list(value),
        },
        _ if value.as_str() == Some(WILDCARD) => Condition::MatchAll,
        lookup => Condition::Lookup {
            field,
            lookup: lookup.to_string(),
            value: value.clone(),
        },
    }
}

fn compile_ip_in(field: String, value: &Value) -> Condition {
    let entries = into_list(value);
    if has_wildcard(&entries) {
        return Condition::MatchAll;
    }
    let matchers: Vec<IpMatcher> = entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(IpMatcher::parse)
        .collect();
    if matchers.is_empty() {
        Condition::MatchNone
    } else {
        Condition::IpIn { field, matchers }
    }
}

/// Compiled conditions of one permission plus their combination mode.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub mode: DataPermissionMode,
    pub conditions: Vec<Condition>,
}

impl RuleSet {
    pub fn compile(mode: DataPermissionMode, rules: &Value) -> Result<Self, CoreError> {
        Ok(Self {
            mode,
            conditions: compile_rules(rules)?,
        })
    }

    /// OR over no conditions is false; AND over no conditions is true.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        match self.mode {
            DataPermissionMode::Or => self.conditions.iter().any(|c| c.matches(row)),
            DataPermissionMode::And => self.conditions.iter().all(|c| c.matches(row)),
        }
    }
}
