//! Kubernetes-standard status condition helpers
//!
//! Conditions are kept as an ordered list that holds at most one entry per
//! type. All writes go through [`set_condition`] / [`merge`] so that
//! re-deriving the same diagnosis never moves `lastTransitionTime`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a condition.
///
/// The three addon condition types are named; anything else written by
/// other controllers (or reported on manifest works) is carried through
/// untouched as [`ConditionType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    Progressing,
    Available,
    Degraded,
    /// Per-manifest apply result on a manifest work
    Applied,
    Other(String),
}

impl ConditionType {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionType::Progressing => "Progressing",
            ConditionType::Available => "Available",
            ConditionType::Degraded => "Degraded",
            ConditionType::Applied => "Applied",
            ConditionType::Other(s) => s,
        }
    }
}

impl From<String> for ConditionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Progressing" => ConditionType::Progressing,
            "Available" => ConditionType::Available,
            "Degraded" => ConditionType::Degraded,
            "Applied" => ConditionType::Applied,
            _ => ConditionType::Other(s),
        }
    }
}

impl From<ConditionType> for String {
    fn from(t: ConditionType) -> Self {
        match t {
            ConditionType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A single status condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[schemars(with = "String")]
    pub r#type: ConditionType,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time the condition transitioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Generation of the object the condition was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Machine-readable reason (CamelCase)
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Build a condition stamped with `now`.
pub fn build_condition(
    condition_type: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> Condition {
    Condition {
        r#type: condition_type,
        status,
        last_transition_time: Some(now),
        observed_generation: None,
        reason: reason.to_string(),
        message: message.into(),
    }
}

/// Find a condition by type.
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    t: &ConditionType,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| &c.r#type == t)
}

/// Whether the list holds a condition of type `t` with status `status`.
pub fn is_condition_status(
    conditions: &[Condition],
    t: &ConditionType,
    status: ConditionStatus,
) -> bool {
    find_condition(conditions, t).is_some_and(|c| c.status == status)
}

/// Set or update a condition in place. Returns whether the list changed.
///
/// `lastTransitionTime` moves only when status or reason changes; a
/// message-only edit updates the message and keeps the old timestamp.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            if existing.status != new.status || existing.reason != new.reason {
                *existing = new;
                true
            } else if existing.message != new.message {
                existing.message = new.message;
                true
            } else {
                false
            }
        }
        None => {
            conditions.push(new);
            true
        }
    }
}

/// Remove every condition of type `t`. Returns whether anything was removed.
pub fn remove_condition(conditions: &mut Vec<Condition>, t: &ConditionType) -> bool {
    let before = conditions.len();
    conditions.retain(|c| &c.r#type != t);
    conditions.len() != before
}

/// Pure form of [`set_condition`].
pub fn merge(mut conditions: Vec<Condition>, new: Condition) -> Vec<Condition> {
    set_condition(&mut conditions, new);
    conditions
}
