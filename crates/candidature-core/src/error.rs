use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid sex: {0}")]
    InvalidSex(String),
    #[error("invalid financing mode: {0}")]
    InvalidFinancingMode(String),
    #[error("invalid language level: {0}")]
    InvalidLanguageLevel(String),
    #[error("invalid candidature uuid: {0}")]
    InvalidUuid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    NotString,
    NotBoolean,
    NotArray,
    NotObject,
    TooLong { max: usize },
    TooFewItems { min: usize },
    NotOneOf { allowed: &'static [&'static str] },
    InvalidDate,
    Underage { min_age: i32 },
    InvalidPhone,
    InvalidEmail,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorKind::Required => write!(f, "est requis"),
            FieldErrorKind::NotString => write!(f, "doit être une chaîne de caractères"),
            FieldErrorKind::NotBoolean => write!(f, "doit être un booléen"),
            FieldErrorKind::NotArray => write!(f, "doit être un tableau"),
            FieldErrorKind::NotObject => write!(f, "doit être un objet"),
            FieldErrorKind::TooLong { max } => write!(f, "ne doit pas dépasser {max} caractères"),
            FieldErrorKind::TooFewItems { min } => {
                write!(f, "doit contenir au moins {min} élément(s)")
            }
            FieldErrorKind::NotOneOf { allowed } => {
                write!(f, "doit être l'une des valeurs : {}", allowed.join(", "))
            }
            FieldErrorKind::InvalidDate => write!(f, "doit être une date ISO 8601 valide"),
            FieldErrorKind::Underage { min_age } => write!(f, "âge minimum {min_age} ans"),
            FieldErrorKind::InvalidPhone => {
                write!(f, "doit contenir 8 à 15 chiffres, avec un + optionnel")
            }
            FieldErrorKind::InvalidEmail => write!(f, "doit être une adresse email valide"),
        }
    }
}

/// A single rule violation, keyed by the JSON path of the offending field
/// (`langues[1]`, `niveaux.Anglais`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\"{field}\" {kind}")]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

/// Every violation found in one pass over a submission. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {} field(s)", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub(crate) fn from_vec(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn single(error: FieldError) -> Self {
        Self(vec![error])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|err| err.field == field)
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}
