use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "Homme")]
    Male,
    #[serde(rename = "Femme")]
    Female,
    #[serde(rename = "Autre")]
    Other,
}

impl Sex {
    pub const LABELS: &'static [&'static str] = &["Homme", "Femme", "Autre"];

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Homme",
            Sex::Female => "Femme",
            Sex::Other => "Autre",
        }
    }
}

impl FromStr for Sex {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "Homme" => Ok(Sex::Male),
            "Femme" => Ok(Sex::Female),
            "Autre" => Ok(Sex::Other),
            _ => Err(CoreError::InvalidSex(raw.to_string())),
        }
    }
}
