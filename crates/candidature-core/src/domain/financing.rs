use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinancingMode {
    #[serde(rename = "Vous-même")]
    SelfFunded,
    #[serde(rename = "Institution")]
    Institution,
    #[serde(rename = "Autre")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Optional,
    Required,
}

/// Presence of the funding institution / contact / contact email fields,
/// per financing mode. Adding a mode means adding a row here.
const DETAILS_PRESENCE: &[(FinancingMode, Presence)] = &[
    (FinancingMode::SelfFunded, Presence::Optional),
    (FinancingMode::Institution, Presence::Required),
    (FinancingMode::Other, Presence::Required),
];

impl FinancingMode {
    pub const LABELS: &'static [&'static str] = &["Vous-même", "Institution", "Autre"];

    pub fn as_str(self) -> &'static str {
        match self {
            FinancingMode::SelfFunded => "Vous-même",
            FinancingMode::Institution => "Institution",
            FinancingMode::Other => "Autre",
        }
    }

    pub fn details_presence(self) -> Presence {
        DETAILS_PRESENCE
            .iter()
            .find(|(mode, _)| *mode == self)
            .map(|(_, presence)| *presence)
            .unwrap_or(Presence::Optional)
    }

    pub fn requires_details(self) -> bool {
        self.details_presence() == Presence::Required
    }
}

impl FromStr for FinancingMode {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "Vous-même" => Ok(FinancingMode::SelfFunded),
            "Institution" => Ok(FinancingMode::Institution),
            "Autre" => Ok(FinancingMode::Other),
            _ => Err(CoreError::InvalidFinancingMode(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financing {
    pub mode: FinancingMode,
    pub institution: Option<String>,
    pub contact: Option<String>,
    pub contact_email: Option<String>,
}
