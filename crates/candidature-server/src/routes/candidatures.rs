use crate::error::ApiError;
use crate::notify::Confirmation;
use crate::SharedState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use candidature_core::{
    normalize_email, validate_candidature, CandidatureInput, CandidatureUuid, FieldError,
    FieldErrorKind, Submission, ValidationErrors,
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const SUBMITTED_MESSAGE: &str = "Candidature envoyée avec succès.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
    pub id: i64,
    pub uuid: CandidatureUuid,
    pub date_soumission: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<LastSubmission>,
}

#[derive(Debug, Serialize)]
pub struct LastSubmission {
    pub id: i64,
    pub uuid: CandidatureUuid,
    pub date_soumission: DateTime<Utc>,
}

impl From<Submission> for LastSubmission {
    fn from(value: Submission) -> Self {
        Self {
            id: value.id,
            uuid: value.uuid,
            date_soumission: value.submitted_at,
        }
    }
}

pub async fn submit(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(body) = payload?;
    let input = CandidatureInput::from_json(body)
        .map_err(|err| ApiError::MalformedRequest(err.to_string()))?;
    let candidature = validate_candidature(&input, Local::now().date_naive())?;

    let draft = candidature.clone();
    let submission = state
        .db
        .run(move |store| store.candidatures().submit(&draft))
        .await?;
    info!(id = submission.id, uuid = %submission.uuid, "candidature stored");

    // Detached; the response never waits on mail delivery.
    let _ = state.notifier.dispatch(Confirmation {
        candidature,
        submission: submission.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: SUBMITTED_MESSAGE,
            id: submission.id,
            uuid: submission.uuid,
            date_soumission: submission.submitted_at,
        }),
    ))
}

pub async fn exists(
    State(state): State<SharedState>,
    query: Result<Query<ExistsQuery>, QueryRejection>,
) -> Result<Json<ExistsResponse>, ApiError> {
    let Query(query) = query?;
    let email = query
        .email
        .as_deref()
        .and_then(normalize_email)
        .ok_or_else(|| {
            ValidationErrors::single(FieldError::new("email", FieldErrorKind::Required))
        })?;

    let last = state
        .db
        .run(move |store| store.candidatures().find_latest_by_email(&email))
        .await?;

    Ok(Json(ExistsResponse {
        exists: last.is_some(),
        last: last.map(LastSubmission::from),
    }))
}
