//! Polymorphic YAML values (§4.2): `ValueMatcher` and `BodyMatcher` accept
//! either a bare scalar or a structured mapping. Per §9's redesign note,
//! this is modeled as one pure function per type that inspects the parsed
//! node shape, not as derive-everything or open-world subclassing — the
//! same spirit as `mockforge-core::conditions`'s hand-written
//! `evaluate_condition`.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// The comparison operators a `Condition` can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    Exists,
    NotExists,
    Contains,
    NotContains,
    Matches,
    NotMatches,
    /// Any operator name not in the set above. Always evaluates to `false`
    /// (§4.6, "unknown operator returns false").
    #[serde(other)]
    Unknown,
}

/// An operator plus the value it compares against.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Condition {
    #[serde(default = "default_operator")]
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

fn default_operator() -> Operator {
    Operator::EqualTo
}

impl Condition {
    /// Evaluate this condition against an optional actual value (`None`
    /// means the field was absent from the request).
    pub fn evaluate(&self, actual: Option<&str>) -> Result<bool> {
        Ok(match self.operator {
            Operator::EqualTo => actual == Some(self.value.as_str()),
            Operator::NotEqualTo => actual != Some(self.value.as_str()),
            Operator::Exists => actual.is_some(),
            Operator::NotExists => actual.is_none(),
            Operator::Contains => actual.is_some_and(|a| a.contains(&self.value)),
            Operator::NotContains => !actual.is_some_and(|a| a.contains(&self.value)),
            Operator::Matches => match actual {
                Some(a) => fancy_regex::Regex::new(&self.value)?.is_match(a)?,
                None => false,
            },
            Operator::NotMatches => match actual {
                Some(a) => !fancy_regex::Regex::new(&self.value)?.is_match(a)?,
                None => true,
            },
            Operator::Unknown => false,
        })
    }
}

/// Either a bare scalar (`Equals`) or a `{value, operator}` mapping
/// (`Condition`) — §4.2.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ValueMatcher {
    Equals(String),
    Condition(Condition),
}

impl ValueMatcher {
    /// Evaluate against an optional actual value.
    pub fn evaluate(&self, actual: Option<&str>) -> Result<bool> {
        match self {
            Self::Equals(expected) => Ok(actual == Some(expected.as_str())),
            Self::Condition(cond) => cond.evaluate(actual),
        }
    }
}

impl<'de> Deserialize<'de> for ValueMatcher {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let node = serde_json::Value::deserialize(deserializer)?;
        parse_value_matcher(node).map_err(de::Error::custom)
    }
}

/// `node` → `ValueMatcher`: a scalar becomes `Equals`, a mapping with
/// `value`/`operator` becomes `Condition`.
fn parse_value_matcher(node: serde_json::Value) -> Result<ValueMatcher> {
    match node {
        serde_json::Value::String(s) => Ok(ValueMatcher::Equals(s)),
        serde_json::Value::Number(n) => Ok(ValueMatcher::Equals(n.to_string())),
        serde_json::Value::Bool(b) => Ok(ValueMatcher::Equals(b.to_string())),
        serde_json::Value::Object(_) => {
            let cond: Condition = serde_json::from_value(node)
                .map_err(|e| Error::config(format!("invalid value matcher: {e}")))?;
            Ok(ValueMatcher::Condition(cond))
        }
        other => Err(Error::config(format!("invalid value matcher node: {other}"))),
    }
}

/// A single body condition: the primary condition plus an optional
/// projection (`jsonPath`/`xPath` + namespace bindings) — §3, §4.2.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BodyCondition {
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "jsonPath")]
    pub json_path: Option<String>,
    #[serde(default, rename = "xPath")]
    pub x_path: Option<String>,
    #[serde(default, rename = "xmlNamespaces")]
    pub xml_namespaces: HashMap<String, String>,
}

impl BodyCondition {
    /// A condition field is present only if `operator` or `value` is set
    /// (§4.2: "the primary condition is considered present only if any
    /// condition field is non-empty").
    pub fn has_condition(&self) -> bool {
        self.operator.is_some() || self.value.is_some()
    }

    pub fn as_condition(&self) -> Condition {
        Condition {
            operator: self.operator.unwrap_or(Operator::EqualTo),
            value: self.value.clone().unwrap_or_default(),
        }
    }
}

/// The request-body matcher (§3): an optional primary condition plus
/// `allOf`/`anyOf` of the same shape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BodyMatcher {
    pub primary: Option<BodyCondition>,
    pub all_of: Vec<BodyCondition>,
    pub any_of: Vec<BodyCondition>,
}

impl<'de> Deserialize<'de> for BodyMatcher {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            operator: Option<Operator>,
            #[serde(default)]
            value: Option<String>,
            #[serde(default, rename = "jsonPath")]
            json_path: Option<String>,
            #[serde(default, rename = "xPath")]
            x_path: Option<String>,
            #[serde(default, rename = "xmlNamespaces")]
            xml_namespaces: HashMap<String, String>,
            #[serde(default, rename = "allOf")]
            all_of: Vec<BodyCondition>,
            #[serde(default, rename = "anyOf")]
            any_of: Vec<BodyCondition>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let primary_cond = BodyCondition {
            operator: raw.operator,
            value: raw.value,
            json_path: raw.json_path,
            x_path: raw.x_path,
            xml_namespaces: raw.xml_namespaces,
        };
        let primary = primary_cond.has_condition().then_some(primary_cond);
        Ok(BodyMatcher { primary, all_of: raw.all_of, any_of: raw.any_of })
    }
}

/// A matcher-level `allOf`/`anyOf` expression condition (§4.6.5): an
/// expression of the form `${stores.SCOPE.KEY}` plus an embedded condition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExprCondition {
    pub expression: String,
    #[serde(default = "default_operator")]
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

impl ExprCondition {
    pub fn as_condition(&self) -> Condition {
        Condition { operator: self.operator, value: self.value.clone() }
    }
}
