//! Mapping of raw quiz answers onto the normalized household profile.

use db::models::discipline::Discipline;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use super::quiz_condition::IntakeResponses;

/// Upper bound used for the open-ended top budget bracket.
pub const BUDGET_CEILING: f64 = 250_000.0;
pub const DEFAULT_BUDGET_BRACKET: &str = "10k_25k";
pub const BUDGET_BRACKETS: &[&str] = &["under_10k", "10k_25k", "25k_50k", "50k_100k", "over_100k"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

/// Fixed numeric range for a budget bracket; unknown brackets use `10k_25k`.
pub fn budget_for_bracket(bracket: &str) -> BudgetRange {
    let (min, max) = match bracket {
        "under_10k" => (0.0, 10_000.0),
        "10k_25k" => (10_000.0, 25_000.0),
        "25k_50k" => (25_000.0, 50_000.0),
        "50k_100k" => (50_000.0, 100_000.0),
        "over_100k" => (100_000.0, BUDGET_CEILING),
        _ => (10_000.0, 25_000.0),
    };
    BudgetRange { min, max }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct HomeProfile {
    pub home_type: String,
    pub build_year: Option<u32>,
    pub household_size: u32,
    pub ownership: String,
    pub energy_label: String,
    pub postcode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct HeatPumpProfile {
    pub current_heating: String,
    pub heat_pump_type: String,
    pub emitters: String,
    pub annual_gas_m3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SolarProfile {
    pub roof_orientation: String,
    pub roof_area_m2: f64,
    pub shading: String,
    pub annual_usage_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BatteryProfile {
    pub has_solar: String,
    pub goal: String,
    pub capacity_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct InsulationProfile {
    pub areas: Vec<String>,
    pub current_glazing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AircoProfile {
    pub rooms: u32,
    pub usage: String,
    pub noise_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct HeatDistributionProfile {
    pub current_system: String,
    pub low_temperature_ready: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct DisciplineProfiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wp: Option<HeatPumpProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<SolarProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolatie: Option<InsulationProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac: Option<AircoProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afgifte: Option<HeatDistributionProfile>,
}

impl DisciplineProfiles {
    pub fn contains(&self, discipline: Discipline) -> bool {
        match discipline {
            Discipline::HeatPump => self.wp.is_some(),
            Discipline::Solar => self.pv.is_some(),
            Discipline::Battery => self.battery.is_some(),
            Discipline::Insulation => self.isolatie.is_some(),
            Discipline::AirConditioning => self.ac.is_some(),
            Discipline::HeatDistribution => self.afgifte.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct NormalizedProfile {
    pub budget_bracket: String,
    pub budget: BudgetRange,
    pub goals: Vec<String>,
    pub home: HomeProfile,
    pub selected_disciplines: Vec<Discipline>,
    pub disciplines: DisciplineProfiles,
}

fn text(map: &Map<String, Value>, key: &str, default: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn whole(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v >= 0.0).map(|v| v.round() as u32)
}

/// Build the profile from raw answers. Absent answers fall back to defaults;
/// this never fails.
pub fn compute_normalized_profile(
    responses: &IntakeResponses,
    disciplines: &[Discipline],
) -> NormalizedProfile {
    let bracket = responses
        .get("budget_range")
        .and_then(Value::as_str)
        .filter(|bracket| BUDGET_BRACKETS.contains(bracket))
        .unwrap_or(DEFAULT_BUDGET_BRACKET);

    let home = HomeProfile {
        home_type: text(responses, "home_type", "terraced"),
        build_year: whole(number(responses, "build_year")),
        household_size: whole(number(responses, "household_size")).unwrap_or(2),
        ownership: text(responses, "ownership", "owner"),
        energy_label: text(responses, "energy_label", "unknown"),
        postcode: responses
            .get("postcode")
            .and_then(Value::as_str)
            .map(|p| p.trim().to_uppercase())
            .filter(|p| !p.is_empty()),
    };

    let mut profiles = DisciplineProfiles::default();
    for discipline in disciplines {
        let Some(Value::Object(answers)) = responses.get(discipline.key()) else {
            continue;
        };
        match discipline {
            Discipline::HeatPump => {
                profiles.wp = Some(HeatPumpProfile {
                    current_heating: text(answers, "current_heating", "gas_boiler"),
                    heat_pump_type: text(answers, "heat_pump_type", "no_preference"),
                    emitters: text(answers, "emitters", "radiators"),
                    annual_gas_m3: number(answers, "annual_gas_m3").unwrap_or(1_200.0),
                })
            }
            Discipline::Solar => {
                profiles.pv = Some(SolarProfile {
                    roof_orientation: text(answers, "roof_orientation", "south"),
                    roof_area_m2: number(answers, "roof_area_m2").unwrap_or(20.0),
                    shading: text(answers, "shading", "none"),
                    annual_usage_kwh: number(answers, "annual_usage_kwh").unwrap_or(3_500.0),
                })
            }
            Discipline::Battery => {
                profiles.battery = Some(BatteryProfile {
                    has_solar: text(answers, "has_solar", "no"),
                    goal: text(answers, "goal", "self_consumption"),
                    capacity_kwh: number(answers, "capacity_kwh").unwrap_or(10.0),
                })
            }
            Discipline::Insulation => {
                profiles.isolatie = Some(InsulationProfile {
                    areas: list(answers, "areas"),
                    current_glazing: text(answers, "current_glazing", "double"),
                })
            }
            Discipline::AirConditioning => {
                profiles.ac = Some(AircoProfile {
                    rooms: whole(number(answers, "rooms")).unwrap_or(1),
                    usage: text(answers, "usage", "cooling"),
                    noise_sensitive: text(answers, "noise_sensitive", "no") == "yes",
                })
            }
            Discipline::HeatDistribution => {
                profiles.afgifte = Some(HeatDistributionProfile {
                    current_system: text(answers, "current_system", "radiators"),
                    low_temperature_ready: text(answers, "low_temperature_ready", "unknown"),
                })
            }
        }
    }

    NormalizedProfile {
        budget_bracket: bracket.to_string(),
        budget: budget_for_bracket(bracket),
        goals: list(responses, "goals"),
        home,
        selected_disciplines: disciplines.to_vec(),
        disciplines: profiles,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn responses(value: Value) -> IntakeResponses {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_every_bracket_maps_to_its_documented_range() {
        let cases = [
            ("under_10k", 0.0, 10_000.0),
            ("10k_25k", 10_000.0, 25_000.0),
            ("25k_50k", 25_000.0, 50_000.0),
            ("50k_100k", 50_000.0, 100_000.0),
            ("over_100k", 100_000.0, BUDGET_CEILING),
        ];
        for (bracket, min, max) in cases {
            let profile =
                compute_normalized_profile(&responses(json!({ "budget_range": bracket })), &[]);
            assert_eq!(profile.budget, BudgetRange { min, max }, "{bracket}");
        }
    }

    #[test]
    fn test_unknown_or_missing_bracket_falls_back() {
        let unknown = compute_normalized_profile(&responses(json!({ "budget_range": "lots" })), &[]);
        assert_eq!(unknown.budget, budget_for_bracket("10k_25k"));
        assert_eq!(unknown.budget_bracket, DEFAULT_BUDGET_BRACKET);

        let missing = compute_normalized_profile(&IntakeResponses::new(), &[]);
        assert_eq!(missing.budget, budget_for_bracket("10k_25k"));
        assert_eq!(missing.budget_bracket, DEFAULT_BUDGET_BRACKET);
    }

    #[test]
    fn test_absent_discipline_answers_are_omitted() {
        let r = responses(json!({
            "budget_range": "under_10k",
            "pv": { "roof_orientation": "east_west" }
        }));
        let profile = compute_normalized_profile(&r, &[Discipline::Battery, Discipline::Solar]);

        assert!(profile.disciplines.battery.is_none());
        let pv = profile.disciplines.pv.unwrap();
        assert_eq!(pv.roof_orientation, "east_west");
        assert_eq!(pv.roof_area_m2, 20.0);

        let json = serde_json::to_value(compute_normalized_profile(&r, &[])).unwrap();
        assert_eq!(json["disciplines"], json!({}));
    }

    #[test]
    fn test_home_attributes_default_when_missing() {
        let r = responses(json!({
            "household_size": "4",
            "build_year": 1932,
            "postcode": " 1234ab ",
            "goals": ["comfort", "lower_bills"]
        }));
        let profile = compute_normalized_profile(&r, &[]);
        assert_eq!(profile.home.household_size, 4);
        assert_eq!(profile.home.build_year, Some(1932));
        assert_eq!(profile.home.home_type, "terraced");
        assert_eq!(profile.home.postcode.as_deref(), Some("1234AB"));
        assert_eq!(profile.goals, vec!["comfort", "lower_bills"]);
    }

    #[test]
    fn test_scoped_answers_fill_discipline_profiles() {
        let r = responses(json!({
            "ac": { "rooms": 3, "noise_sensitive": "yes" },
            "isolatie": { "areas": ["roof", "glazing"] }
        }));
        let profile =
            compute_normalized_profile(&r, &[Discipline::AirConditioning, Discipline::Insulation]);
        let ac = profile.disciplines.ac.unwrap();
        assert_eq!(ac.rooms, 3);
        assert!(ac.noise_sensitive);
        assert_eq!(ac.usage, "cooling");
        assert_eq!(profile.disciplines.isolatie.unwrap().areas, vec!["roof", "glazing"]);
    }
}
