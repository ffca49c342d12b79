use crate::error::{ConstraintKind, Result, StoreError};
use candidature_core::domain::{
    normalize_email, CandidatureDraft, CandidatureRecord, CandidatureUuid, Financing,
    FinancingMode, LanguageLevel, Sex, Submission,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::str::FromStr;

const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

const RECORD_COLUMNS: &str = "id, uuid, date_soumission, \
     nom, prenom, nationalite, sexe, date_naissance, lieu_naissance, telephone, email, \
     organisation, pays, departement, poste_actuel, description_taches, \
     diplome, institution, domaine, langues, niveaux, resultats_attendus, autres_infos, \
     mode_financement, institution_financement, contact_financement, email_contact_financement, \
     source, consentement";

pub struct CandidaturesRepo<'a> {
    conn: &'a Connection,
}

impl<'a> CandidaturesRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Duplicate guard then insert.
    ///
    /// The lookup and the insert are separate statements, so two concurrent
    /// submissions can both pass the lookup. The unique index on
    /// `lower(email)` rejects the second insert, which surfaces as the same
    /// `DuplicateEmail` error as the lookup.
    pub fn submit(&self, draft: &CandidatureDraft) -> Result<Submission> {
        if let Some(existing) = self.find_latest_by_email(&draft.email)? {
            return Err(StoreError::DuplicateEmail {
                email: draft.email.clone(),
                existing: Some(existing),
            });
        }
        self.insert(draft, CandidatureUuid::new())
    }

    /// Inserts without the duplicate lookup. Constraint violations are
    /// classified; a unique violation on the email index becomes
    /// `DuplicateEmail`.
    pub fn insert(&self, draft: &CandidatureDraft, uuid: CandidatureUuid) -> Result<Submission> {
        let languages = serde_json::to_string(&draft.languages)?;
        let levels = serde_json::to_string(&draft.levels)?;
        let financing = &draft.financing;

        let inserted = self
            .conn
            .query_row(
                "INSERT INTO candidatures (
                    uuid, nom, prenom, nationalite, sexe, date_naissance, lieu_naissance,
                    telephone, email, organisation, pays, departement, poste_actuel,
                    description_taches, diplome, institution, domaine, langues, niveaux,
                    resultats_attendus, autres_infos, mode_financement,
                    institution_financement, contact_financement, email_contact_financement,
                    source, consentement
                 ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
                 )
                 RETURNING id, date_soumission;",
                params![
                    uuid.to_string(),
                    draft.last_name,
                    draft.first_name,
                    draft.nationality,
                    draft.sex.as_str(),
                    draft.birth_date.format(BIRTH_DATE_FORMAT).to_string(),
                    draft.birth_place,
                    draft.phone,
                    draft.email,
                    draft.organisation,
                    draft.country,
                    draft.department,
                    draft.current_role,
                    draft.task_description,
                    draft.diploma,
                    draft.institution,
                    draft.field_of_study,
                    languages,
                    levels,
                    draft.expected_results,
                    draft.other_info,
                    financing.mode.as_str(),
                    financing.institution,
                    financing.contact,
                    financing.contact_email,
                    draft.source,
                    draft.consent,
                ],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(|err| self.classify_insert_error(err, &draft.email));

        let (id, submitted_at) = inserted?;
        Ok(Submission {
            id,
            uuid,
            submitted_at: parse_timestamp(submitted_at)?,
        })
    }

    pub fn find_latest_by_email(&self, email: &str) -> Result<Option<Submission>> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };
        let row = self
            .conn
            .query_row(
                "SELECT id, uuid, date_soumission FROM candidatures
                 WHERE lower(email) = ?1
                 ORDER BY date_soumission DESC, id DESC
                 LIMIT 1;",
                [email],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, uuid, submitted_at)) => Ok(Some(Submission {
                id,
                uuid: parse_uuid(uuid)?,
                submitted_at: parse_timestamp(submitted_at)?,
            })),
            None => Ok(None),
        }
    }

    pub fn get(&self, id: i64) -> Result<Option<CandidatureRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM candidatures WHERE id = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(record_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_uuid(&self, uuid: CandidatureUuid) -> Result<Option<CandidatureRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM candidatures WHERE uuid = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([uuid.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(record_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM candidatures;", [], |row| row.get(0))?;
        Ok(count)
    }

    fn classify_insert_error(&self, err: rusqlite::Error, email: &str) -> StoreError {
        let failure = match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Some((failure.extended_code, message.clone().unwrap_or_default()))
            }
            _ => None,
        };
        let Some((extended_code, message)) = failure else {
            return err.into();
        };
        let kind = match extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                ConstraintKind::Unique
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
            rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
            _ => return err.into(),
        };

        if kind == ConstraintKind::Unique && message.contains("email") {
            return match self.find_latest_by_email(email) {
                Ok(existing) => StoreError::DuplicateEmail {
                    email: email.to_string(),
                    existing,
                },
                Err(lookup) => lookup,
            };
        }
        StoreError::Constraint { kind, message }
    }
}

fn record_from_row(row: &Row<'_>) -> Result<CandidatureRecord> {
    let uuid = parse_uuid(row.get(1)?)?;
    let submitted_at = parse_timestamp(row.get(2)?)?;

    let sex: String = row.get(6)?;
    let birth_date: String = row.get(7)?;
    let birth_date = NaiveDate::parse_from_str(&birth_date, BIRTH_DATE_FORMAT)
        .map_err(|_| StoreError::InvalidDate(birth_date.clone()))?;
    let languages: String = row.get(19)?;
    let levels: String = row.get(20)?;
    let mode: String = row.get(23)?;

    let candidature = CandidatureDraft {
        last_name: row.get(3)?,
        first_name: row.get(4)?,
        nationality: row.get(5)?,
        sex: Sex::from_str(&sex)?,
        birth_date,
        birth_place: row.get(8)?,
        phone: row.get(9)?,
        email: row.get(10)?,
        organisation: row.get(11)?,
        country: row.get(12)?,
        department: row.get(13)?,
        current_role: row.get(14)?,
        task_description: row.get(15)?,
        diploma: row.get(16)?,
        institution: row.get(17)?,
        field_of_study: row.get(18)?,
        languages: serde_json::from_str::<Vec<String>>(&languages)?,
        levels: serde_json::from_str::<BTreeMap<String, LanguageLevel>>(&levels)?,
        expected_results: row.get(21)?,
        other_info: row.get(22)?,
        financing: Financing {
            mode: FinancingMode::from_str(&mode)?,
            institution: row.get(24)?,
            contact: row.get(25)?,
            contact_email: row.get(26)?,
        },
        source: row.get(27)?,
        consent: row.get(28)?,
    };

    Ok(CandidatureRecord {
        id: row.get(0)?,
        uuid,
        submitted_at,
        candidature,
    })
}

fn parse_uuid(raw: String) -> Result<CandidatureUuid> {
    CandidatureUuid::from_str(&raw).map_err(|_| StoreError::InvalidId(raw))
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidDate(raw))
}
