use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

/// Product area a household can ask advice for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    EnumIter,
)]
pub enum Discipline {
    /// Heat pump
    #[serde(rename = "wp")]
    #[strum(serialize = "wp")]
    HeatPump,
    /// Solar panels
    #[serde(rename = "pv")]
    #[strum(serialize = "pv")]
    Solar,
    #[serde(rename = "battery")]
    #[strum(serialize = "battery")]
    Battery,
    #[serde(rename = "isolatie")]
    #[strum(serialize = "isolatie")]
    Insulation,
    #[serde(rename = "ac")]
    #[strum(serialize = "ac")]
    AirConditioning,
    /// Heat distribution (radiators, floor heating)
    #[serde(rename = "afgifte")]
    #[strum(serialize = "afgifte")]
    HeatDistribution,
}

impl Discipline {
    /// Key used for the discipline's sub-object in stored responses.
    pub fn key(self) -> &'static str {
        match self {
            Self::HeatPump => "wp",
            Self::Solar => "pv",
            Self::Battery => "battery",
            Self::Insulation => "isolatie",
            Self::AirConditioning => "ac",
            Self::HeatDistribution => "afgifte",
        }
    }

    /// Catalog table backing this discipline, if it has one.
    pub fn catalog_table(self) -> Option<&'static str> {
        match self {
            Self::HeatPump => Some("heat_pumps"),
            Self::Solar => Some("solar_panels"),
            Self::Battery => Some("batteries"),
            Self::AirConditioning => Some("airco_units"),
            Self::Insulation | Self::HeatDistribution => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_key_matches_display_and_serde() {
        for discipline in Discipline::iter() {
            assert_eq!(discipline.to_string(), discipline.key());
            assert_eq!(Discipline::from_str(discipline.key()).unwrap(), discipline);
            let json = serde_json::to_value(discipline).unwrap();
            assert_eq!(json, discipline.key());
        }
    }

    #[test]
    fn test_insulation_has_no_catalog_table() {
        assert!(Discipline::Insulation.catalog_table().is_none());
        assert_eq!(Discipline::Solar.catalog_table(), Some("solar_panels"));
    }
}
