//! Static question graph of the intake quiz.

use std::collections::{BTreeMap, HashSet};

use db::models::discipline::Discipline;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::quiz_condition::Condition;

pub const FIRST_STEP: &str = "budget_range";
pub const DISCIPLINE_STEP: &str = "disciplines";

pub const BUDGET_ABOVE_10K: [&str; 4] = ["10k_25k", "25k_50k", "50k_100k", "over_100k"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    SingleChoice,
    MultiChoice,
    Range,
    Text,
    Dropdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "discipline", rename_all = "snake_case")]
pub enum StepCategory {
    Common,
    Discipline(Discipline),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
    pub description: Option<String>,
    /// Disciplines selecting this option turns on.
    pub activates: Vec<Discipline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ValidationRules {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct QuizStep {
    pub id: String,
    pub category: StepCategory,
    /// Key the answer is stored under; scoped to the discipline sub-object for
    /// discipline questions.
    pub field: String,
    pub prompt: String,
    pub description: Option<String>,
    pub input: InputKind,
    pub options: Vec<QuestionOption>,
    pub validation: ValidationRules,
    pub next_step: Option<String>,
    pub show_if: Option<Condition>,
}

impl QuizStep {
    fn new(id: &str, prompt: &str, input: InputKind) -> Self {
        Self {
            id: id.to_string(),
            category: StepCategory::Common,
            field: id.to_string(),
            prompt: prompt.to_string(),
            description: None,
            input,
            options: Vec::new(),
            validation: ValidationRules::default(),
            next_step: None,
            show_if: None,
        }
    }

    fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn choices(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(value, label)| QuestionOption {
                value: value.to_string(),
                label: label.to_string(),
                description: None,
                activates: Vec::new(),
            })
            .collect();
        self
    }

    fn required(mut self) -> Self {
        self.validation.required = true;
        self
    }

    fn bounds(mut self, min: f64, max: f64) -> Self {
        self.validation.min = Some(min);
        self.validation.max = Some(max);
        self
    }

    fn pattern(mut self, pattern: &str) -> Self {
        self.validation.pattern = Some(pattern.to_string());
        self
    }

    fn then(mut self, next: &str) -> Self {
        self.next_step = Some(next.to_string());
        self
    }

    fn show_if(mut self, condition: Condition) -> Self {
        self.show_if = Some(condition);
        self
    }

    fn scoped(mut self, discipline: Discipline, field: &str) -> Self {
        self.category = StepCategory::Discipline(discipline);
        self.field = field.to_string();
        self
    }

    pub fn discipline(&self) -> Option<Discipline> {
        match self.category {
            StepCategory::Common => None,
            StepCategory::Discipline(d) => Some(d),
        }
    }

    /// Path of this question's answer inside the responses snapshot.
    pub fn response_path(&self) -> String {
        match self.category {
            StepCategory::Common => self.field.clone(),
            StepCategory::Discipline(d) => format!("{}.{}", d.key(), self.field),
        }
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    DuplicateId(String),
    DanglingNextStep { step: String, next: String },
    UnknownConditionField { step: String, field: String },
    MissingFirstStep,
    MissingDisciplineStep,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizConfig {
    pub common: Vec<QuizStep>,
    pub disciplines: BTreeMap<Discipline, Vec<QuizStep>>,
}

impl QuizConfig {
    pub fn question_by_id(&self, id: &str) -> Option<&QuizStep> {
        self.all_steps().find(|step| step.id == id)
    }

    pub fn discipline_questions(&self, discipline: Discipline) -> &[QuizStep] {
        self.disciplines
            .get(&discipline)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_steps(&self) -> impl Iterator<Item = &QuizStep> {
        self.common
            .iter()
            .chain(self.disciplines.values().flat_map(|steps| steps.iter()))
    }

    /// Check the graph for duplicate ids, dangling `next_step` links and
    /// conditions that read answers no question produces.
    pub fn validate_graph(&self) -> Result<(), Vec<GraphIssue>> {
        let mut issues = Vec::new();
        let mut ids = HashSet::new();
        let paths: HashSet<String> = self.all_steps().map(QuizStep::response_path).collect();

        for step in self.all_steps() {
            if !ids.insert(step.id.as_str()) {
                issues.push(GraphIssue::DuplicateId(step.id.clone()));
            }
        }
        for step in self.all_steps() {
            if let Some(next) = &step.next_step {
                if !ids.contains(next.as_str()) {
                    issues.push(GraphIssue::DanglingNextStep {
                        step: step.id.clone(),
                        next: next.clone(),
                    });
                }
            }
            if let Some(condition) = &step.show_if {
                for field in condition.fields() {
                    if !paths.contains(field) {
                        issues.push(GraphIssue::UnknownConditionField {
                            step: step.id.clone(),
                            field: field.to_string(),
                        });
                    }
                }
            }
        }
        if !ids.contains(FIRST_STEP) {
            issues.push(GraphIssue::MissingFirstStep);
        }
        if !ids.contains(DISCIPLINE_STEP) {
            issues.push(GraphIssue::MissingDisciplineStep);
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

pub static QUIZ: Lazy<QuizConfig> = Lazy::new(build_quiz);

pub fn quiz() -> &'static QuizConfig {
    &QUIZ
}

fn build_quiz() -> QuizConfig {
    let mut disciplines = BTreeMap::new();
    disciplines.insert(Discipline::HeatPump, heat_pump_questions());
    disciplines.insert(Discipline::Solar, solar_questions());
    disciplines.insert(Discipline::Battery, battery_questions());
    disciplines.insert(Discipline::Insulation, insulation_questions());
    disciplines.insert(Discipline::AirConditioning, airco_questions());
    disciplines.insert(Discipline::HeatDistribution, heat_distribution_questions());

    QuizConfig {
        common: common_questions(),
        disciplines,
    }
}

fn common_questions() -> Vec<QuizStep> {
    use InputKind::*;

    let discipline_options: Vec<QuestionOption> = [
        (Discipline::HeatPump, "Heat pump"),
        (Discipline::Solar, "Solar panels"),
        (Discipline::Battery, "Home battery"),
        (Discipline::Insulation, "Insulation"),
        (Discipline::AirConditioning, "Air conditioning"),
        (Discipline::HeatDistribution, "Heat distribution"),
    ]
    .into_iter()
    .map(|(discipline, label)| QuestionOption {
        value: discipline.key().to_string(),
        label: label.to_string(),
        description: None,
        activates: vec![discipline],
    })
    .collect();

    vec![
        QuizStep::new(FIRST_STEP, "What budget do you have in mind?", SingleChoice)
            .choices(&[
                ("under_10k", "Under €10.000"),
                ("10k_25k", "€10.000 – €25.000"),
                ("25k_50k", "€25.000 – €50.000"),
                ("50k_100k", "€50.000 – €100.000"),
                ("over_100k", "Over €100.000"),
            ])
            .required()
            .then("goals"),
        QuizStep::new("goals", "What do you want to achieve?", MultiChoice)
            .describe("Pick everything that applies.")
            .choices(&[
                ("lower_bills", "Lower energy bills"),
                ("sustainability", "A more sustainable home"),
                ("comfort", "More comfort"),
                ("independence", "Independence from the grid"),
                ("home_value", "Higher home value"),
            ])
            .required()
            .then("home_type"),
        QuizStep::new("home_type", "What type of home do you live in?", Dropdown)
            .choices(&[
                ("detached", "Detached house"),
                ("semi_detached", "Semi-detached house"),
                ("terraced", "Terraced house"),
                ("apartment", "Apartment"),
                ("bungalow", "Bungalow"),
            ])
            .required()
            .then("build_year"),
        QuizStep::new("build_year", "When was your home built?", Range)
            .bounds(1800.0, 2030.0)
            .required()
            .then("household_size"),
        QuizStep::new("household_size", "How many people live in your home?", Range)
            .bounds(1.0, 12.0)
            .required()
            .then("postcode"),
        QuizStep::new("postcode", "What is your postcode?", Text)
            .describe("Used for regional subsidies, optional.")
            .pattern(r"^[1-9][0-9]{3}\s?[A-Za-z]{2}$")
            .then("ownership"),
        QuizStep::new("ownership", "Do you own or rent your home?", SingleChoice)
            .choices(&[("owner", "I own it"), ("tenant", "I rent it")])
            .required()
            .then("energy_label"),
        QuizStep::new("energy_label", "What is your home's energy label?", Dropdown)
            .choices(&[
                ("a", "A or better"),
                ("b", "B"),
                ("c", "C"),
                ("d", "D"),
                ("e_or_worse", "E or worse"),
                ("unknown", "I don't know"),
            ])
            .then(DISCIPLINE_STEP),
        QuizStep {
            options: discipline_options,
            ..QuizStep::new(
                DISCIPLINE_STEP,
                "Which topics would you like advice on?",
                MultiChoice,
            )
            .required()
        },
    ]
}

fn heat_pump_questions() -> Vec<QuizStep> {
    use InputKind::*;
    let d = Discipline::HeatPump;
    vec![
        QuizStep::new("wp_current_heating", "How is your home heated today?", SingleChoice)
            .choices(&[
                ("gas_boiler", "Gas boiler"),
                ("district_heating", "District heating"),
                ("electric", "Electric heating"),
                ("hybrid", "Hybrid heat pump"),
            ])
            .required()
            .scoped(d, "current_heating"),
        QuizStep::new("wp_heat_pump_type", "Which kind of heat pump interests you?", SingleChoice)
            .choices(&[
                ("air_water", "Air-to-water"),
                ("ground_water", "Ground-source"),
                ("hybrid", "Hybrid"),
                ("no_preference", "No preference"),
            ])
            .required()
            .scoped(d, "heat_pump_type"),
        QuizStep::new("wp_emitters", "How is heat delivered in your rooms?", SingleChoice)
            .choices(&[
                ("radiators", "Radiators"),
                ("floor_heating", "Floor heating"),
                ("mixed", "A mix"),
            ])
            .show_if(Condition::negate(Condition::equals(
                "wp.current_heating",
                "district_heating",
            )))
            .scoped(d, "emitters"),
        QuizStep::new("wp_annual_gas_m3", "How much gas do you use per year (m³)?", Range)
            .bounds(0.0, 10_000.0)
            .show_if(Condition::equals("wp.current_heating", "gas_boiler"))
            .scoped(d, "annual_gas_m3"),
    ]
}

fn solar_questions() -> Vec<QuizStep> {
    use InputKind::*;
    let d = Discipline::Solar;
    vec![
        QuizStep::new("pv_roof_orientation", "Which way does your roof face?", SingleChoice)
            .choices(&[
                ("south", "South"),
                ("east_west", "East/West"),
                ("north", "North"),
                ("flat", "Flat roof"),
            ])
            .required()
            .scoped(d, "roof_orientation"),
        QuizStep::new("pv_roof_area_m2", "How much roof area is available (m²)?", Range)
            .bounds(5.0, 500.0)
            .required()
            .scoped(d, "roof_area_m2"),
        QuizStep::new("pv_shading", "Is your roof shaded?", SingleChoice)
            .choices(&[("none", "No"), ("partial", "Partially"), ("heavy", "Heavily")])
            .show_if(Condition::negate(Condition::equals("pv.roof_orientation", "flat")))
            .scoped(d, "shading"),
        QuizStep::new("pv_annual_usage_kwh", "What is your yearly electricity use (kWh)?", Range)
            .bounds(0.0, 50_000.0)
            .scoped(d, "annual_usage_kwh"),
    ]
}

fn battery_questions() -> Vec<QuizStep> {
    use InputKind::*;
    let d = Discipline::Battery;
    let budget = Condition::one_of(FIRST_STEP, BUDGET_ABOVE_10K);
    vec![
        QuizStep::new("battery_has_solar", "Do you have solar panels?", SingleChoice)
            .choices(&[("yes", "Yes"), ("planned", "Planned"), ("no", "No")])
            .required()
            .show_if(budget.clone())
            .scoped(d, "has_solar"),
        QuizStep::new("battery_goal", "What should the battery do for you?", SingleChoice)
            .choices(&[
                ("self_consumption", "Use more of my own solar power"),
                ("backup", "Backup during outages"),
                ("dynamic_tariff", "Trade on a dynamic tariff"),
            ])
            .required()
            .show_if(budget.clone())
            .scoped(d, "goal"),
        QuizStep::new("battery_capacity_kwh", "Which capacity do you have in mind (kWh)?", Range)
            .bounds(2.0, 40.0)
            .show_if(Condition::All {
                conditions: vec![
                    budget,
                    Condition::negate(Condition::equals("battery.has_solar", "no")),
                ],
            })
            .scoped(d, "capacity_kwh"),
    ]
}

fn insulation_questions() -> Vec<QuizStep> {
    use InputKind::*;
    let d = Discipline::Insulation;
    vec![
        QuizStep::new("isolatie_areas", "Which parts of your home need insulation?", MultiChoice)
            .choices(&[
                ("roof", "Roof"),
                ("facade", "Cavity wall / facade"),
                ("floor", "Floor"),
                ("glazing", "Glazing"),
            ])
            .required()
            .scoped(d, "areas"),
        QuizStep::new("isolatie_current_glazing", "What glazing do you have now?", SingleChoice)
            .choices(&[
                ("single", "Single glazing"),
                ("double", "Double glazing"),
                ("hr_plus_plus", "HR++ or better"),
            ])
            .show_if(Condition::contains("isolatie.areas", "glazing"))
            .scoped(d, "current_glazing"),
    ]
}

fn airco_questions() -> Vec<QuizStep> {
    use InputKind::*;
    let d = Discipline::AirConditioning;
    vec![
        QuizStep::new("ac_rooms", "How many rooms need air conditioning?", Range)
            .bounds(1.0, 10.0)
            .required()
            .scoped(d, "rooms"),
        QuizStep::new("ac_usage", "How will you use it?", SingleChoice)
            .choices(&[
                ("cooling", "Cooling only"),
                ("heating_and_cooling", "Heating and cooling"),
            ])
            .required()
            .scoped(d, "usage"),
        QuizStep::new("ac_noise_sensitive", "Will a unit be placed in a bedroom?", SingleChoice)
            .choices(&[("yes", "Yes"), ("no", "No")])
            .scoped(d, "noise_sensitive"),
    ]
}

fn heat_distribution_questions() -> Vec<QuizStep> {
    use InputKind::*;
    let d = Discipline::HeatDistribution;
    vec![
        QuizStep::new("afgifte_current_system", "What heat emitters do you have?", SingleChoice)
            .choices(&[
                ("radiators", "Radiators"),
                ("floor_heating", "Floor heating"),
                ("convectors", "Convectors"),
                ("mixed", "A mix"),
            ])
            .required()
            .scoped(d, "current_system"),
        QuizStep::new(
            "afgifte_low_temperature_ready",
            "Do your emitters work at low water temperatures?",
            SingleChoice,
        )
        .choices(&[("yes", "Yes"), ("no", "No"), ("unknown", "I don't know")])
        .show_if(Condition::negate(Condition::equals(
            "afgifte.current_system",
            "floor_heating",
        )))
        .scoped(d, "low_temperature_ready"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_graph_is_valid() {
        assert_eq!(quiz().validate_graph(), Ok(()));
    }

    #[test]
    fn test_every_discipline_has_questions() {
        use strum::IntoEnumIterator;
        for discipline in Discipline::iter() {
            assert!(
                !quiz().discipline_questions(discipline).is_empty(),
                "{discipline} has no questions"
            );
        }
    }

    #[test]
    fn test_common_steps_chain_to_discipline_selection() {
        let mut current = quiz().question_by_id(FIRST_STEP).unwrap();
        let mut visited = 1;
        while let Some(next) = &current.next_step {
            current = quiz().question_by_id(next).unwrap();
            visited += 1;
        }
        assert_eq!(current.id, DISCIPLINE_STEP);
        assert_eq!(visited, quiz().common.len());
    }

    #[test]
    fn test_dangling_links_and_unknown_fields_are_reported() {
        let mut config = quiz().clone();
        config.common[0].next_step = Some("nowhere".into());
        config.common[1].show_if = Some(Condition::equals("pv.unknown", "x"));

        let issues = config.validate_graph().unwrap_err();
        assert!(issues.contains(&GraphIssue::DanglingNextStep {
            step: FIRST_STEP.into(),
            next: "nowhere".into()
        }));
        assert!(issues.contains(&GraphIssue::UnknownConditionField {
            step: "goals".into(),
            field: "pv.unknown".into()
        }));
    }

    #[test]
    fn test_scoped_questions_report_their_response_path() {
        let step = quiz().question_by_id("wp_current_heating").unwrap();
        assert_eq!(step.discipline(), Some(Discipline::HeatPump));
        assert_eq!(step.response_path(), "wp.current_heating");
    }
}
