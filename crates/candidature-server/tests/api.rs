use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use candidature_config::AppConfig;
use candidature_core::CandidatureUuid;
use candidature_server::db::Database;
use candidature_server::notify::{Confirmation, ConfirmationMailer, Dispatcher};
use candidature_server::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<CandidatureUuid>>,
}

impl ConfirmationMailer for RecordingMailer {
    fn send(&self, confirmation: &Confirmation) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(confirmation.submission.uuid);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    mailer: Arc<RecordingMailer>,
    _dir: TempDir,
}

fn app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let mut config = AppConfig::default();
    config.cors.origins = vec!["https://candidature.gpe.cm".to_string()];
    configure(&mut config);

    let db = Database::open(dir.path().join("candidatures.sqlite3")).expect("open db");
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(config, db, Dispatcher::new(mailer.clone())).expect("state");

    TestApp {
        router: create_router(Arc::new(state)),
        mailer,
        _dir: dir,
    }
}

fn app() -> TestApp {
    app_with(|_| {})
}

fn valid_body(email: &str) -> Value {
    json!({
        "nom": "Ngono",
        "prenom": "Estelle",
        "nationalite": "Camerounaise",
        "sexe": "Femme",
        "dateNaissance": "1990-05-17",
        "lieuNaissance": "Ebolowa",
        "telephone": "+237690123456",
        "email": email,
        "organisation": "MINESEC",
        "pays": "Cameroun",
        "posteActuel": "Conseillère pédagogique",
        "descriptionTaches": "Accompagnement des enseignants.",
        "diplome": "Master",
        "institution": "Université de Yaoundé I",
        "domaine": "Éducation",
        "langues": ["Français", "Anglais"],
        "niveaux": { "Français": "natif", "Anglais": "intermediaire" },
        "resultatsAttendus": "Améliorer le suivi.",
        "mode": "Vous-même",
        "source": "Site web",
        "consentement": true
    })
}

fn post_json(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/candidatures")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

#[tokio::test]
async fn accepted_submission_returns_identity() {
    let app = app();
    let (status, headers, json) = send(&app, post_json(&valid_body("estelle@example.cm"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Candidature envoyée avec succès.");
    assert!(json["id"].as_i64().unwrap() > 0);
    let uuid: CandidatureUuid = json["uuid"].as_str().unwrap().parse().unwrap();
    let submitted = json["dateSoumission"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(submitted).is_ok());
    assert!(headers.contains_key("x-request-id"));

    // Delivery happens on a detached task.
    for _ in 0..50 {
        if !app.mailer.sent.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(*app.mailer.sent.lock().unwrap(), vec![uuid]);
}

#[tokio::test]
async fn same_email_twice_is_a_conflict() {
    let app = app();
    let (status, _, first) = send(&app, post_json(&valid_body("estelle@example.cm"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, json) = send(&app, post_json(&valid_body("  Estelle@Example.CM"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Une candidature avec cet email existe déjà.");
    assert_eq!(json["details"][0], format!("id: {}", first["id"]));
    assert!(json["details"][1]
        .as_str()
        .unwrap()
        .starts_with("dateSoumission: "));
}

#[tokio::test]
async fn validation_failure_reports_every_field() {
    let app = app();
    let mut body = valid_body("estelle@example.cm");
    body.as_object_mut().unwrap().remove("nom");
    body["telephone"] = json!("12345");
    body["dateNaissance"] = json!("2015-01-01");
    body["mode"] = json!("Institution");

    let (status, _, json) = send(&app, post_json(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Validation échouée");

    let details: Vec<&str> = json["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|value| value.as_str().unwrap())
        .collect();
    assert_eq!(details[0], "\"nom\" est requis");
    assert!(details.iter().any(|d| d.starts_with("\"dateNaissance\"")));
    assert!(details.iter().any(|d| d.starts_with("\"telephone\"")));
    assert!(details.iter().any(|d| d.starts_with("\"contactFinancement\"")));
}

#[tokio::test]
async fn unknown_fields_are_ignored() {
    let app = app();
    let mut body = valid_body("estelle@example.cm");
    body["role"] = json!("admin");
    body["id"] = json!(999);

    let (status, _, json) = send(&app, post_json(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(json["id"], 999);
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let app = app();
    let broken = Request::builder()
        .method("POST")
        .uri("/api/candidatures")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"nom\": "))
        .unwrap();
    let (status, _, json) = send(&app, broken).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "JSON invalide dans la requête.");

    let (status, _, json) = send(&app, post_json(&json!(["not", "an", "object"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "JSON invalide dans la requête.");

    let plain = Request::builder()
        .method("POST")
        .uri("/api/candidatures")
        .body(Body::from("nom=Ngono"))
        .unwrap();
    let (status, _, _) = send(&app, plain).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = app_with(|config| config.server.body_limit_bytes = 64);
    let (status, _, json) = send(&app, post_json(&valid_body("estelle@example.cm"))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["message"], "Requête trop volumineuse.");
}

#[tokio::test]
async fn exists_reports_the_latest_submission() {
    let app = app();
    let (status, _, json) = send(&app, get("/api/candidatures/exists?email=estelle@example.cm")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "exists": false }));

    let (_, _, created) = send(&app, post_json(&valid_body("estelle@example.cm"))).await;

    let (status, _, json) =
        send(&app, get("/api/candidatures/exists?email=ESTELLE%40example.cm")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["exists"], true);
    assert_eq!(json["last"]["id"], created["id"]);
    assert_eq!(json["last"]["uuid"], created["uuid"]);
    assert_eq!(json["last"]["date_soumission"], created["dateSoumission"]);
}

#[tokio::test]
async fn exists_requires_an_email() {
    let app = app();
    for uri in [
        "/api/candidatures/exists",
        "/api/candidatures/exists?email=",
        "/api/candidatures/exists?email=%20%20",
    ] {
        let (status, _, json) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["details"][0], "\"email\" est requis");
    }
}

#[tokio::test]
async fn health_and_fallback() {
    let app = app();
    for uri in ["/health", "/api/candidatures/health"] {
        let (status, _, json) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true }));
    }

    let (status, _, json) = send(&app, get("/api/inconnu")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json,
        json!({ "success": false, "message": "Ressource introuvable" })
    );
}

#[tokio::test]
async fn origins_outside_the_allow_list_are_refused() {
    let app = app();
    let allowed = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://candidature.gpe.cm")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, allowed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://candidature.gpe.cm"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let refused = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let (status, _, json) = send(&app, refused).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "CORS: origine non autorisée");
    assert_eq!(json["details"][0], "origin: https://evil.example");
}

#[tokio::test]
async fn clients_are_rate_limited_per_ip() {
    let app = app_with(|config| {
        config.server.trust_proxy = true;
        config.rate_limit.max_requests = 2;
    });
    let from = |ip: &str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let (status, _, _) = send(&app, from("203.0.113.9")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, json) = send(&app, from("203.0.113.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["message"], "Trop de requêtes. Réessayez plus tard.");

    let (status, _, _) = send(&app, from("203.0.113.10")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_method_and_bad_query_use_the_error_envelope() {
    let app = app();
    let (status, _, json) = send(&app, get("/api/candidatures")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        json,
        json!({ "success": false, "message": "Méthode non autorisée" })
    );

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/candidatures/exists")
        .body(Body::empty())
        .unwrap();
    let (status, _, json) = send(&app, delete).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["success"], false);

    let (status, _, json) = send(
        &app,
        get("/api/candidatures/exists?email=a@b.cm&email=c@d.cm"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json,
        json!({ "success": false, "message": "Paramètres de requête invalides." })
    );
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = app();
    for uri in ["/health", "/api/inconnu"] {
        let (_, headers, _) = send(&app, get(uri)).await;
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff", "{uri}");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN", "{uri}");
        assert_eq!(headers[header::REFERRER_POLICY], "no-referrer", "{uri}");
    }
}
