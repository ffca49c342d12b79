use serde::Deserialize;
use serde_json::Value;

/// Raw form body as posted by the client. Every field is kept as untyped
/// JSON so the validator can report type mismatches field by field; keys
/// not listed here are dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidatureInput {
    pub nom: Option<Value>,
    pub prenom: Option<Value>,
    pub nationalite: Option<Value>,
    pub sexe: Option<Value>,
    pub date_naissance: Option<Value>,
    pub lieu_naissance: Option<Value>,
    pub telephone: Option<Value>,
    pub email: Option<Value>,

    pub organisation: Option<Value>,
    pub pays: Option<Value>,
    pub departement: Option<Value>,
    pub poste_actuel: Option<Value>,
    pub description_taches: Option<Value>,

    pub diplome: Option<Value>,
    pub institution: Option<Value>,
    pub domaine: Option<Value>,

    pub langues: Option<Value>,
    pub niveaux: Option<Value>,

    pub resultats_attendus: Option<Value>,
    pub autres_infos: Option<Value>,

    pub mode: Option<Value>,
    pub institution_financement: Option<Value>,
    pub contact_financement: Option<Value>,
    pub email_contact_financement: Option<Value>,

    pub source: Option<Value>,
    pub consentement: Option<Value>,
}

impl CandidatureInput {
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
