use crate::domain::financing::Financing;
use crate::domain::ids::CandidatureUuid;
use crate::domain::level::LanguageLevel;
use crate::domain::sex::Sex;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatureDraft {
    pub last_name: String,
    pub first_name: String,
    pub nationality: String,
    pub sex: Sex,
    pub birth_date: NaiveDate,
    pub birth_place: String,
    pub phone: String,
    pub email: String,

    pub organisation: Option<String>,
    pub country: String,
    pub department: Option<String>,
    pub current_role: String,
    pub task_description: String,

    pub diploma: String,
    pub institution: String,
    pub field_of_study: String,

    pub languages: Vec<String>,
    pub levels: BTreeMap<String, LanguageLevel>,

    pub expected_results: String,
    pub other_info: Option<String>,

    pub financing: Financing,

    pub source: String,
    pub consent: bool,
}

impl CandidatureDraft {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub uuid: CandidatureUuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatureRecord {
    pub id: i64,
    pub uuid: CandidatureUuid,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub candidature: CandidatureDraft,
}

impl CandidatureRecord {
    pub fn submission(&self) -> Submission {
        Submission {
            id: self.id,
            uuid: self.uuid,
            submitted_at: self.submitted_at,
        }
    }
}
