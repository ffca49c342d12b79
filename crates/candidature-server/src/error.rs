use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use candidature_core::{Submission, ValidationErrors};
use candidature_store::{ConstraintKind, StoreError};
use chrono::SecondsFormat;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub diagnostics: bool,
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

pub async fn with_request_context<Fut, T>(context: RequestContext, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    REQUEST_CONTEXT.scope(context, fut).await
}

pub fn current_context() -> RequestContext {
    REQUEST_CONTEXT
        .try_with(|context| context.clone())
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("invalid query string: {0}")]
    InvalidQuery(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("duplicate email")]
    DuplicateEmail { existing: Option<Submission> },
    #[error("{kind} constraint failed: {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    #[error("origin rejected: {0}")]
    OriginRejected(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::MalformedRequest(_)
            | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::DuplicateEmail { .. } => StatusCode::CONFLICT,
            ApiError::Constraint { kind, .. } => match kind {
                ConstraintKind::Unique | ConstraintKind::ForeignKey => StatusCode::CONFLICT,
                ConstraintKind::Check | ConstraintKind::NotNull => StatusCode::BAD_REQUEST,
            },
            ApiError::OriginRejected(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation échouée",
            ApiError::MalformedRequest(_) => "JSON invalide dans la requête.",
            ApiError::InvalidQuery(_) => "Paramètres de requête invalides.",
            ApiError::PayloadTooLarge => "Requête trop volumineuse.",
            ApiError::DuplicateEmail { .. } => "Une candidature avec cet email existe déjà.",
            ApiError::Constraint { kind, .. } => match kind {
                ConstraintKind::Unique => "Conflit : entrée déjà existante.",
                ConstraintKind::ForeignKey => "Contrainte d’intégrité violée (clé étrangère).",
                ConstraintKind::Check | ConstraintKind::NotNull => "Paramètre invalide.",
            },
            ApiError::OriginRejected(_) => "CORS: origine non autorisée",
            ApiError::RateLimited => "Trop de requêtes. Réessayez plus tard.",
            ApiError::NotFound(_) => "Ressource introuvable",
            ApiError::MethodNotAllowed(_) => "Méthode non autorisée",
            ApiError::Internal(_) => "Erreur interne. Réessayez plus tard.",
        }
    }

    fn details(&self, diagnostics: bool) -> Option<Vec<String>> {
        match self {
            ApiError::Validation(errors) => Some(errors.messages()),
            ApiError::DuplicateEmail {
                existing: Some(existing),
            } => Some(vec![
                format!("id: {}", existing.id),
                format!(
                    "dateSoumission: {}",
                    existing
                        .submitted_at
                        .to_rfc3339_opts(SecondsFormat::Millis, true)
                ),
            ]),
            ApiError::OriginRejected(origin) => Some(vec![format!("origin: {origin}")]),
            ApiError::Internal(message) if diagnostics => Some(vec![message.clone()]),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let context = current_context();
        let request_id = context.request_id.as_deref().unwrap_or("");

        if status.is_server_error() {
            error!(status = %status, request_id, error = %self, "api_error");
        } else {
            info!(status = %status, request_id, error = %self, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            message: self.public_message(),
            details: self.details(context.diagnostics),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(value: ValidationErrors) -> Self {
        ApiError::Validation(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        if value.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::MalformedRequest(value.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::InvalidQuery(value.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateEmail { existing, .. } => ApiError::DuplicateEmail { existing },
            StoreError::Constraint { kind, message } => ApiError::Constraint { kind, message },
            StoreError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candidature_core::{CandidatureUuid, FieldError, FieldErrorKind};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn render(err: ApiError, diagnostics: bool) -> (StatusCode, Value) {
        let context = RequestContext {
            request_id: Some("req-1".to_string()),
            diagnostics,
        };
        let response = with_request_context(context, async { err.into_response() }).await;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.expect("body").to_bytes();
        (parts.status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn validation_errors_list_every_field() {
        let errors = ValidationErrors::single(FieldError::new("email", FieldErrorKind::Required));
        let (status, json) = render(errors.into(), false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Validation échouée");
        assert_eq!(json["details"][0], "\"email\" est requis");
    }

    #[tokio::test]
    async fn duplicate_points_at_the_prior_submission() {
        let existing = Submission {
            id: 7,
            uuid: CandidatureUuid::new(),
            submitted_at: Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap(),
        };
        let err: ApiError = StoreError::DuplicateEmail {
            email: "a@example.cm".to_string(),
            existing: Some(existing),
        }
        .into();
        let (status, json) = render(err, false).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "Une candidature avec cet email existe déjà.");
        assert_eq!(json["details"][0], "id: 7");
        assert_eq!(json["details"][1], "dateSoumission: 2025-03-10T08:30:00.000Z");
    }

    #[tokio::test]
    async fn constraint_kinds_map_to_their_status() {
        let cases = [
            (ConstraintKind::Unique, StatusCode::CONFLICT),
            (ConstraintKind::ForeignKey, StatusCode::CONFLICT),
            (ConstraintKind::Check, StatusCode::BAD_REQUEST),
            (ConstraintKind::NotNull, StatusCode::BAD_REQUEST),
        ];
        for (kind, expected) in cases {
            let err = ApiError::Constraint {
                kind,
                message: "constraint failed".to_string(),
            };
            assert_eq!(err.status_code(), expected, "{kind}");
        }
        let (_, json) = render(
            ApiError::Constraint {
                kind: ConstraintKind::Check,
                message: "CHECK constraint failed: sexe".to_string(),
            },
            true,
        )
        .await;
        assert_eq!(json["message"], "Paramètre invalide.");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn internal_details_only_in_development() {
        let (status, json) = render(ApiError::Internal("disk full".to_string()), false).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Erreur interne. Réessayez plus tard.");
        assert!(json.get("details").is_none());

        let (_, json) = render(ApiError::Internal("disk full".to_string()), true).await;
        assert_eq!(json["details"][0], "disk full");
    }

    #[tokio::test]
    async fn method_and_query_errors_use_the_envelope() {
        let (status, json) = render(ApiError::MethodNotAllowed("DELETE".to_string()), false).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "Méthode non autorisée" })
        );

        let err = ApiError::InvalidQuery("duplicate field `email`".to_string());
        let (status, json) = render(err, false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Paramètres de requête invalides.");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn rendering_outside_a_request_uses_defaults() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
