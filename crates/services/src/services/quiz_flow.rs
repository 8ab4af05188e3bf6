//! Step sequencing, answer validation and response accumulation for the quiz.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use db::models::discipline::Discipline;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;
use ts_rs::TS;

use super::{
    quiz_condition::IntakeResponses,
    quiz_config::{DISCIPLINE_STEP, FIRST_STEP, InputKind, QuizConfig, QuizStep},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },
    #[error("{field} must be at least {min}")]
    BelowMin { field: String, min: f64 },
    #[error("{field} must be at most {max}")]
    AboveMax { field: String, max: f64 },
    #[error("{field} has an invalid format")]
    PatternMismatch { field: String },
    #[error("{value} is not a valid option for {field}")]
    NotAnOption { field: String, value: String },
    #[error("{field} expects {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("invalid validation pattern for {field}: {message}")]
    InvalidPattern { field: String, message: String },
}

#[derive(Debug, Error)]
pub enum QuizFlowError {
    #[error("unknown quiz step: {0}")]
    UnknownStep(String),
    #[error("unknown discipline: {0}")]
    UnknownDiscipline(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Where the quiz goes after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "step", rename_all = "snake_case")]
pub enum NextStep {
    Step(String),
    Complete,
}

impl NextStep {
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::Step(id) => Some(id),
            Self::Complete => None,
        }
    }
}

pub fn first_step() -> &'static str {
    FIRST_STEP
}

/// Whether a question should be asked given the answers so far.
///
/// A condition that fails to evaluate shows the question.
pub fn is_visible(step: &QuizStep, responses: &IntakeResponses) -> bool {
    let Some(condition) = &step.show_if else {
        return true;
    };
    match condition.evaluate(responses) {
        Ok(visible) => visible,
        Err(e) => {
            warn!(step = %step.id, error = %e, "Visibility condition failed, showing question");
            true
        }
    }
}

/// Determine the step that follows `current`.
pub fn next_step(
    config: &QuizConfig,
    current: &str,
    responses: &IntakeResponses,
    disciplines: &[Discipline],
) -> Result<NextStep, QuizFlowError> {
    let step = config
        .question_by_id(current)
        .ok_or_else(|| QuizFlowError::UnknownStep(current.to_string()))?;

    if let Some(next) = &step.next_step {
        return Ok(NextStep::Step(next.clone()));
    }

    if step.id == DISCIPLINE_STEP {
        return Ok(first_visible_in(config, disciplines, responses));
    }

    if let Some(discipline) = step.discipline() {
        let questions = config.discipline_questions(discipline);
        if let Some(position) = questions.iter().position(|q| q.id == step.id) {
            if let Some(next) = questions[position + 1..]
                .iter()
                .find(|q| is_visible(q, responses))
            {
                return Ok(NextStep::Step(next.id.clone()));
            }
        }

        return Ok(match disciplines.iter().position(|d| *d == discipline) {
            Some(index) => first_visible_in(config, &disciplines[index + 1..], responses),
            None => NextStep::Complete,
        });
    }

    Ok(NextStep::Complete)
}

fn first_visible_in(
    config: &QuizConfig,
    disciplines: &[Discipline],
    responses: &IntakeResponses,
) -> NextStep {
    disciplines
        .iter()
        .flat_map(|d| config.discipline_questions(*d))
        .find(|q| is_visible(q, responses))
        .map(|q| NextStep::Step(q.id.clone()))
        .unwrap_or(NextStep::Complete)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compiled validation patterns, keyed by source.
static PATTERNS: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(regex) = PATTERNS.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)?;
    PATTERNS.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Check a single answer against the question's rules.
pub fn validate_answer(step: &QuizStep, value: &Value) -> Result<(), ValidationError> {
    let field = || step.id.clone();

    if is_blank(value) {
        return if step.validation.required {
            Err(ValidationError::Required { field: field() })
        } else {
            Ok(())
        };
    }

    match step.input {
        InputKind::Range => {
            let number = as_number(value).ok_or_else(|| ValidationError::WrongType {
                field: field(),
                expected: "a number",
            })?;
            if let Some(min) = step.validation.min {
                if number < min {
                    return Err(ValidationError::BelowMin { field: field(), min });
                }
            }
            if let Some(max) = step.validation.max {
                if number > max {
                    return Err(ValidationError::AboveMax { field: field(), max });
                }
            }
        }
        InputKind::Text => {
            let text = value.as_str().ok_or_else(|| ValidationError::WrongType {
                field: field(),
                expected: "text",
            })?;
            if let Some(pattern) = &step.validation.pattern {
                let regex = compiled_pattern(pattern).map_err(|e| ValidationError::InvalidPattern {
                    field: field(),
                    message: e.to_string(),
                })?;
                if !regex.is_match(text.trim()) {
                    return Err(ValidationError::PatternMismatch { field: field() });
                }
            }
        }
        InputKind::SingleChoice | InputKind::Dropdown => {
            let choice = value.as_str().ok_or_else(|| ValidationError::WrongType {
                field: field(),
                expected: "a single option",
            })?;
            if !step.has_option(choice) {
                return Err(ValidationError::NotAnOption {
                    field: field(),
                    value: choice.to_string(),
                });
            }
        }
        InputKind::MultiChoice => {
            let items = value.as_array().ok_or_else(|| ValidationError::WrongType {
                field: field(),
                expected: "a list of options",
            })?;
            for item in items {
                let choice = item.as_str().ok_or_else(|| ValidationError::WrongType {
                    field: field(),
                    expected: "a list of options",
                })?;
                if !step.has_option(choice) {
                    return Err(ValidationError::NotAnOption {
                        field: field(),
                        value: choice.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Parse a discipline selection answer into a distinct, order-preserving list.
pub fn parse_discipline_selection(value: &Value) -> Result<Vec<Discipline>, QuizFlowError> {
    let names: Vec<&str> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(single) => vec![single.as_str()],
        _ => Vec::new(),
    };

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let discipline = Discipline::from_str(name)
            .map_err(|_| QuizFlowError::UnknownDiscipline(name.to_string()))?;
        if !selected.contains(&discipline) {
            selected.push(discipline);
        }
    }
    Ok(selected)
}

/// Quiz progress owned by one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct QuizState {
    pub current_step: String,
    #[ts(type = "Record<string, unknown>")]
    pub responses: IntakeResponses,
    pub disciplines: Vec<Discipline>,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
}

impl Default for QuizState {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizState {
    pub fn new() -> Self {
        Self {
            current_step: first_step().to_string(),
            responses: Map::new(),
            disciplines: Vec::new(),
            completed: false,
            started_at: Utc::now(),
        }
    }

    /// Record an answer without validating it.
    ///
    /// Common answers land at the top level, discipline answers are merged into
    /// the discipline's sub-object, and the discipline selection replaces
    /// `disciplines`.
    pub fn apply_answer(&mut self, step: &QuizStep, value: Value) -> Result<(), QuizFlowError> {
        if step.id == DISCIPLINE_STEP {
            self.disciplines = parse_discipline_selection(&value)?;
            return Ok(());
        }

        match step.discipline() {
            None => {
                self.responses.insert(step.field.clone(), value);
            }
            Some(discipline) => {
                let entry = self
                    .responses
                    .entry(discipline.key().to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Value::Object(scoped) = entry {
                    scoped.insert(step.field.clone(), value);
                }
            }
        }
        Ok(())
    }

    /// Validate and record an answer to `question_id`, then move to the next step.
    pub fn answer(
        &mut self,
        config: &QuizConfig,
        question_id: &str,
        value: Value,
    ) -> Result<NextStep, QuizFlowError> {
        let step = config
            .question_by_id(question_id)
            .ok_or_else(|| QuizFlowError::UnknownStep(question_id.to_string()))?;
        validate_answer(step, &value)?;
        self.apply_answer(step, value)?;

        let next = next_step(config, question_id, &self.responses, &self.disciplines)?;
        if let NextStep::Step(id) = &next {
            self.current_step = id.clone();
        }
        Ok(next)
    }

    /// The recorded answer for a question, if any.
    pub fn answer_for(&self, step: &QuizStep) -> Option<&Value> {
        match step.discipline() {
            None => self.responses.get(&step.field),
            Some(d) => self.responses.get(d.key()).and_then(|s| s.get(&step.field)),
        }
    }
}
