//! Visibility conditions for quiz questions.
//!
//! A condition is plain data evaluated against a snapshot of the answers given
//! so far. Field paths are either a top-level question id (`budget_range`) or
//! a discipline-scoped answer (`wp.current_heating`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use ts_rs::TS;

/// Answers keyed by question id, or by discipline key for scoped answers.
pub type IntakeResponses = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("field `{0}` is not numeric")]
    NotNumeric(String),
    #[error("field `{0}` is not a list")]
    NotAList(String),
    #[error("empty field path")]
    EmptyPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals {
        field: String,
        #[ts(type = "unknown")]
        value: Value,
    },
    OneOf {
        field: String,
        #[ts(type = "unknown[]")]
        values: Vec<Value>,
    },
    /// The field holds a list that contains `value`.
    Contains {
        field: String,
        #[ts(type = "unknown")]
        value: Value,
    },
    AtLeast {
        field: String,
        value: f64,
    },
    AtMost {
        field: String,
        value: f64,
    },
    Answered {
        field: String,
    },
    Not {
        condition: Box<Condition>,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
}

impl Condition {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn one_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::OneOf {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Self::Contains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    #[cfg(test)]
    pub fn at_least(field: &str, value: f64) -> Self {
        Self::AtLeast {
            field: field.to_string(),
            value,
        }
    }

    pub fn negate(condition: Condition) -> Self {
        Self::Not {
            condition: Box::new(condition),
        }
    }

    /// Evaluate against an answer snapshot. A missing field never matches.
    pub fn evaluate(&self, responses: &IntakeResponses) -> Result<bool, ConditionError> {
        match self {
            Self::Equals { field, value } => {
                Ok(lookup(responses, field)?.is_some_and(|actual| values_equal(actual, value)))
            }
            Self::OneOf { field, values } => Ok(lookup(responses, field)?
                .is_some_and(|actual| values.iter().any(|v| values_equal(actual, v)))),
            Self::Contains { field, value } => match lookup(responses, field)? {
                None | Some(Value::Null) => Ok(false),
                Some(Value::Array(items)) => Ok(items.iter().any(|v| values_equal(v, value))),
                Some(_) => Err(ConditionError::NotAList(field.clone())),
            },
            Self::AtLeast { field, value } => {
                Ok(numeric(responses, field)?.is_some_and(|actual| actual >= *value))
            }
            Self::AtMost { field, value } => {
                Ok(numeric(responses, field)?.is_some_and(|actual| actual <= *value))
            }
            Self::Answered { field } => Ok(lookup(responses, field)?.is_some_and(is_answered)),
            Self::Not { condition } => Ok(!condition.evaluate(responses)?),
            Self::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(responses)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any { conditions } => {
                for condition in conditions {
                    if condition.evaluate(responses)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Every field path this condition reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Equals { field, .. }
            | Self::OneOf { field, .. }
            | Self::Contains { field, .. }
            | Self::AtLeast { field, .. }
            | Self::AtMost { field, .. }
            | Self::Answered { field } => vec![field.as_str()],
            Self::Not { condition } => condition.fields(),
            Self::All { conditions } | Self::Any { conditions } => {
                conditions.iter().flat_map(|c| c.fields()).collect()
            }
        }
    }
}

/// Resolve `question` or `discipline.question` in the snapshot.
pub fn lookup<'a>(
    responses: &'a IntakeResponses,
    path: &str,
) -> Result<Option<&'a Value>, ConditionError> {
    let mut segments = path.split('.').filter(|s| !s.is_empty());
    let first = segments.next().ok_or(ConditionError::EmptyPath)?;
    let mut current = match responses.get(first) {
        Some(value) => value,
        None => return Ok(None),
    };
    for segment in segments {
        current = match current.get(segment) {
            Some(value) => value,
            None => return Ok(None),
        };
    }
    Ok(Some(current))
}

fn numeric(responses: &IntakeResponses, field: &str) -> Result<Option<f64>, ConditionError> {
    match lookup(responses, field)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConditionError::NotNumeric(field.to_string())),
        Some(_) => Err(ConditionError::NotNumeric(field.to_string())),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn is_answered(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}
