//! Terminal prompts for quiz steps.

use anyhow::Result;
use dialoguer::{Input, MultiSelect, Select, theme::ColorfulTheme};
use serde_json::{Number, Value};
use services::services::quiz_config::{InputKind, QuizStep};

/// Parse a typed number, keeping whole numbers integral.
pub fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim().replace(',', ".");
    if let Ok(whole) = trimmed.parse::<i64>() {
        return Some(Value::from(whole));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Indices of the options already chosen in a previous answer.
pub fn selected_indices(step: &QuizStep, previous: Option<&Value>) -> Vec<bool> {
    let chosen: Vec<&str> = match previous {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(single)) => vec![single.as_str()],
        _ => Vec::new(),
    };
    step.options
        .iter()
        .map(|option| chosen.contains(&option.value.as_str()))
        .collect()
}

fn prompt_text(step: &QuizStep) -> String {
    match &step.description {
        Some(description) => format!("{} ({description})", step.prompt),
        None => step.prompt.clone(),
    }
}

/// Ask one question and return the raw answer. Validation happens afterwards.
pub fn ask(step: &QuizStep, previous: Option<&Value>) -> Result<Value> {
    let theme = ColorfulTheme::default();
    let prompt = prompt_text(step);
    let labels: Vec<&str> = step.options.iter().map(|o| o.label.as_str()).collect();
    let defaults = selected_indices(step, previous);

    let value = match step.input {
        InputKind::SingleChoice | InputKind::Dropdown => {
            let default = defaults.iter().position(|chosen| *chosen).unwrap_or(0);
            let index = Select::with_theme(&theme)
                .with_prompt(prompt)
                .items(&labels)
                .default(default)
                .interact()?;
            Value::String(step.options[index].value.clone())
        }
        InputKind::MultiChoice => {
            let indices = MultiSelect::with_theme(&theme)
                .with_prompt(prompt)
                .items(&labels)
                .defaults(&defaults)
                .interact()?;
            Value::Array(
                indices
                    .into_iter()
                    .map(|i| Value::String(step.options[i].value.clone()))
                    .collect(),
            )
        }
        InputKind::Range => {
            let mut input = Input::<String>::with_theme(&theme)
                .with_prompt(prompt)
                .allow_empty(!step.validation.required)
                .validate_with(|raw: &String| -> Result<(), &str> {
                    if raw.trim().is_empty() || parse_number(raw).is_some() {
                        Ok(())
                    } else {
                        Err("enter a number")
                    }
                });
            if let Some(previous) = previous {
                input = input.with_initial_text(previous.to_string());
            }
            let raw = input.interact_text()?;
            parse_number(&raw).unwrap_or(Value::Null)
        }
        InputKind::Text => {
            let mut input = Input::<String>::with_theme(&theme)
                .with_prompt(prompt)
                .allow_empty(!step.validation.required);
            if let Some(Value::String(previous)) = previous {
                input = input.with_initial_text(previous.clone());
            }
            let raw = input.interact_text()?;
            if raw.trim().is_empty() {
                Value::Null
            } else {
                Value::String(raw.trim().to_string())
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use services::services::quiz_config::quiz;

    use super::*;

    #[test]
    fn test_numbers_keep_integers_integral() {
        assert_eq!(parse_number("1932"), Some(json!(1932)));
        assert_eq!(parse_number(" 12,5 "), Some(json!(12.5)));
        assert_eq!(parse_number("many"), None);
    }

    #[test]
    fn test_previous_answers_preselect_options() {
        let step = quiz().question_by_id("disciplines").unwrap();
        let selected = selected_indices(step, Some(&json!(["pv", "wp"])));
        let chosen: Vec<&str> = step
            .options
            .iter()
            .zip(&selected)
            .filter(|(_, chosen)| **chosen)
            .map(|(option, _)| option.value.as_str())
            .collect();
        assert_eq!(chosen.len(), 2);
        assert!(chosen.contains(&"wp") && chosen.contains(&"pv"));
        assert!(selected_indices(step, None).iter().all(|chosen| !chosen));
    }
}
