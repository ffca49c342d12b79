use crate::domain::{
    is_valid_email, is_valid_phone, normalize_email, normalize_level, CandidatureDraft, Financing,
    FinancingMode, LanguageLevel, Presence, Sex,
};
use crate::error::{FieldError, FieldErrorKind, ValidationErrors};
use crate::input::CandidatureInput;
use crate::rules::age::{is_adult, parse_birth_date, MIN_AGE};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

const NAME_MAX: usize = 100;
const SHORT_TEXT_MAX: usize = 50;
const EMAIL_MAX: usize = 150;
const ORGANISATION_MAX: usize = 200;
const LONG_TEXT_MAX: usize = 500;
const OTHER_INFO_MAX: usize = 1000;
const MIN_LANGUAGES: usize = 1;

/// Checks every field, collecting errors in form order, then normalizes.
pub fn validate_candidature(
    input: &CandidatureInput,
    today: NaiveDate,
) -> Result<CandidatureDraft, ValidationErrors> {
    let mut check = Checker::default();

    let last_name = check.required_text("nom", input.nom.as_ref(), NAME_MAX);
    let first_name = check.required_text("prenom", input.prenom.as_ref(), NAME_MAX);
    let nationality = check.required_text("nationalite", input.nationalite.as_ref(), SHORT_TEXT_MAX);
    let sex = check.choice::<Sex>("sexe", input.sexe.as_ref(), Sex::LABELS);
    let birth_date = check.birth_date("dateNaissance", input.date_naissance.as_ref(), today);
    let birth_place =
        check.required_text("lieuNaissance", input.lieu_naissance.as_ref(), SHORT_TEXT_MAX);
    let phone = check.phone("telephone", input.telephone.as_ref());
    let email = check.email("email", input.email.as_ref(), Presence::Required);

    let organisation = check.text(
        "organisation",
        input.organisation.as_ref(),
        ORGANISATION_MAX,
        Presence::Optional,
    );
    let country = check.required_text("pays", input.pays.as_ref(), SHORT_TEXT_MAX);
    let department = check.text(
        "departement",
        input.departement.as_ref(),
        NAME_MAX,
        Presence::Optional,
    );
    let current_role = check.required_text("posteActuel", input.poste_actuel.as_ref(), NAME_MAX);
    let task_description = check.required_text(
        "descriptionTaches",
        input.description_taches.as_ref(),
        LONG_TEXT_MAX,
    );

    let diploma = check.required_text("diplome", input.diplome.as_ref(), SHORT_TEXT_MAX);
    let institution =
        check.required_text("institution", input.institution.as_ref(), ORGANISATION_MAX);
    let field_of_study = check.required_text("domaine", input.domaine.as_ref(), NAME_MAX);

    let languages = check.languages("langues", input.langues.as_ref());
    let levels = check.levels("niveaux", input.niveaux.as_ref());

    let expected_results = check.required_text(
        "resultatsAttendus",
        input.resultats_attendus.as_ref(),
        LONG_TEXT_MAX,
    );
    let other_info = check.text(
        "autresInfos",
        input.autres_infos.as_ref(),
        OTHER_INFO_MAX,
        Presence::Optional,
    );

    let mode = check.choice::<FinancingMode>("mode", input.mode.as_ref(), FinancingMode::LABELS);
    // An invalid mode is already reported; its details fall back to optional.
    let details = mode
        .map(FinancingMode::details_presence)
        .unwrap_or(Presence::Optional);
    let funding_institution = check.text(
        "institutionFinancement",
        input.institution_financement.as_ref(),
        ORGANISATION_MAX,
        details,
    );
    let funding_contact = check.text(
        "contactFinancement",
        input.contact_financement.as_ref(),
        NAME_MAX,
        details,
    );
    let funding_contact_email = check.email(
        "emailContactFinancement",
        input.email_contact_financement.as_ref(),
        details,
    );

    let source = check.required_text("source", input.source.as_ref(), SHORT_TEXT_MAX);
    let consent = check.boolean("consentement", input.consentement.as_ref());

    let draft = (move || {
        Some(CandidatureDraft {
            last_name: last_name?,
            first_name: first_name?,
            nationality: nationality?,
            sex: sex?,
            birth_date: birth_date?,
            birth_place: birth_place?,
            phone: phone?,
            email: email?,
            organisation,
            country: country?,
            department,
            current_role: current_role?,
            task_description: task_description?,
            diploma: diploma?,
            institution: institution?,
            field_of_study: field_of_study?,
            languages: languages?,
            levels: levels?,
            expected_results: expected_results?,
            other_info,
            financing: Financing {
                mode: mode?,
                institution: funding_institution,
                contact: funding_contact,
                contact_email: funding_contact_email,
            },
            source: source?,
            consent: consent?,
        })
    })();

    check.finish(draft)
}

#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: impl Into<String>, kind: FieldErrorKind) {
        self.errors.push(FieldError::new(field, kind));
    }

    fn finish(self, draft: Option<CandidatureDraft>) -> Result<CandidatureDraft, ValidationErrors> {
        match (ValidationErrors::from_vec(self.errors), draft) {
            (Some(errors), _) => Err(errors),
            (None, Some(draft)) => Ok(draft),
            // A missing value always records an error first.
            (None, None) => Err(ValidationErrors::single(FieldError::new(
                "body",
                FieldErrorKind::Required,
            ))),
        }
    }

    /// Trimmed string, `None` when absent, blank or not a string. Blank
    /// values only count as an error when the field is required.
    fn string(&mut self, field: &str, value: Option<&Value>, presence: Presence) -> Option<String> {
        match value {
            None | Some(Value::Null) => {
                if presence == Presence::Required {
                    self.fail(field, FieldErrorKind::Required);
                }
                None
            }
            Some(Value::String(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    if presence == Presence::Required {
                        self.fail(field, FieldErrorKind::Required);
                    }
                    return None;
                }
                Some(trimmed.to_string())
            }
            Some(_) => {
                self.fail(field, FieldErrorKind::NotString);
                None
            }
        }
    }

    fn text(
        &mut self,
        field: &str,
        value: Option<&Value>,
        max: usize,
        presence: Presence,
    ) -> Option<String> {
        let text = self.string(field, value, presence)?;
        if text.chars().count() > max {
            self.fail(field, FieldErrorKind::TooLong { max });
            return None;
        }
        Some(text)
    }

    fn required_text(&mut self, field: &str, value: Option<&Value>, max: usize) -> Option<String> {
        self.text(field, value, max, Presence::Required)
    }

    fn choice<T: FromStr>(
        &mut self,
        field: &str,
        value: Option<&Value>,
        allowed: &'static [&'static str],
    ) -> Option<T> {
        let raw = self.string(field, value, Presence::Required)?;
        match T::from_str(&raw) {
            Ok(choice) => Some(choice),
            Err(_) => {
                self.fail(field, FieldErrorKind::NotOneOf { allowed });
                None
            }
        }
    }

    fn birth_date(
        &mut self,
        field: &str,
        value: Option<&Value>,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        let raw = self.string(field, value, Presence::Required)?;
        let Some(date) = parse_birth_date(&raw) else {
            self.fail(field, FieldErrorKind::InvalidDate);
            return None;
        };
        if !is_adult(date, today) {
            self.fail(field, FieldErrorKind::Underage { min_age: MIN_AGE });
            return None;
        }
        Some(date)
    }

    fn phone(&mut self, field: &str, value: Option<&Value>) -> Option<String> {
        let raw = self.string(field, value, Presence::Required)?;
        if !is_valid_phone(&raw) {
            self.fail(field, FieldErrorKind::InvalidPhone);
            return None;
        }
        Some(raw)
    }

    fn email(&mut self, field: &str, value: Option<&Value>, presence: Presence) -> Option<String> {
        let raw = self.text(field, value, EMAIL_MAX, presence)?;
        if !is_valid_email(&raw) {
            self.fail(field, FieldErrorKind::InvalidEmail);
            return None;
        }
        normalize_email(&raw)
    }

    fn languages(&mut self, field: &str, value: Option<&Value>) -> Option<Vec<String>> {
        let items = match value {
            None | Some(Value::Null) => {
                self.fail(field, FieldErrorKind::Required);
                return None;
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.fail(field, FieldErrorKind::NotArray);
                return None;
            }
        };
        if items.len() < MIN_LANGUAGES {
            self.fail(field, FieldErrorKind::TooFewItems { min: MIN_LANGUAGES });
            return None;
        }

        let before = self.errors.len();
        let languages = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                self.required_text(&format!("{field}[{index}]"), Some(item), SHORT_TEXT_MAX)
            })
            .collect::<Vec<_>>();
        (self.errors.len() == before).then_some(languages)
    }

    fn levels(
        &mut self,
        field: &str,
        value: Option<&Value>,
    ) -> Option<BTreeMap<String, LanguageLevel>> {
        let entries = match value {
            None | Some(Value::Null) => {
                self.fail(field, FieldErrorKind::Required);
                return None;
            }
            Some(Value::Object(entries)) => entries,
            Some(_) => {
                self.fail(field, FieldErrorKind::NotObject);
                return None;
            }
        };

        let before = self.errors.len();
        let mut levels = BTreeMap::new();
        for (language, raw_level) in entries {
            let path = format!("{field}.{language}");
            let language = language.trim();
            if language.is_empty() {
                self.fail(path, FieldErrorKind::Required);
                continue;
            }
            if language.chars().count() > SHORT_TEXT_MAX {
                self.fail(path, FieldErrorKind::TooLong { max: SHORT_TEXT_MAX });
                continue;
            }
            let Some(raw_level) = raw_level.as_str() else {
                self.fail(path, FieldErrorKind::NotString);
                continue;
            };
            match normalize_level(raw_level) {
                Some(level) => {
                    levels.insert(language.to_string(), level);
                }
                None => self.fail(
                    path,
                    FieldErrorKind::NotOneOf {
                        allowed: LanguageLevel::LABELS,
                    },
                ),
            }
        }
        (self.errors.len() == before).then_some(levels)
    }

    fn boolean(&mut self, field: &str, value: Option<&Value>) -> Option<bool> {
        match value {
            None | Some(Value::Null) => {
                self.fail(field, FieldErrorKind::Required);
                None
            }
            Some(Value::Bool(flag)) => Some(*flag),
            Some(Value::String(raw)) if raw.trim().eq_ignore_ascii_case("true") => Some(true),
            Some(Value::String(raw)) if raw.trim().eq_ignore_ascii_case("false") => Some(false),
            Some(_) => {
                self.fail(field, FieldErrorKind::NotBoolean);
                None
            }
        }
    }
}
