use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::scholarship::domain::ApplicationStatus;
use crate::workflows::scholarship::repository::ApplicationRepository;
use crate::workflows::scholarship::router::{
    ADMIN_EMAIL_HEADER, ADMIN_ID_HEADER, ADMIN_ROLE_HEADER,
};
use crate::workflows::scholarship::settings::SystemSettings;
use crate::workflows::scholarship::ScholarshipService;

fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ADMIN_ID_HEADER, "admin-7")
        .header(ADMIN_EMAIL_HEADER, "reviewer@example.ph");
    with_body(builder, body)
}

fn super_admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ADMIN_ID_HEADER, "root-1")
        .header(ADMIN_ROLE_HEADER, "super_admin");
    with_body(builder, body)
}

fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

#[tokio::test]
async fn submit_route_creates_pending_application() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::post("/api/v1/applications")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&submission()).expect("serialize submission"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("pending")));
    assert_eq!(payload.get("eligibility"), Some(&json!("passed")));
    assert_eq!(payload.get("name"), Some(&json!("Maria Santos")));
}

#[tokio::test]
async fn submit_handler_returns_unprocessable_for_missing_fields() {
    let (service, _, _) = build_service();
    let mut incomplete = submission();
    incomplete.applicant.first_name.clear();

    let response = crate::workflows::scholarship::router::submit_handler::<
        MemoryStore,
        MemoryNotifier,
    >(State(Arc::new(service)), axum::Json(incomplete))
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn submit_handler_returns_service_unavailable_on_store_outage() {
    let service = Arc::new(ScholarshipService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifier::default()),
        evaluator(),
    ));

    let response = crate::workflows::scholarship::router::submit_handler::<
        UnavailableStore,
        MemoryNotifier,
    >(State(service), axum::Json(submission()))
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_routes_require_identity() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/applications")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_is_unauthorized() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/criteria")
                .header(ADMIN_ID_HEADER, "admin-7")
                .header(ADMIN_ROLE_HEADER, "guest")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_route_applies_query_filters() {
    let (service, store, _) = build_service();
    store
        .insert(stored_record(
            "x1",
            applicant("Ana", "Lim", "Wawa", "TCU"),
            ApplicationStatus::Approved,
            at(2025, 8, 1, 8),
        ))
        .expect("insert succeeds");
    store
        .insert(stored_record(
            "x2",
            applicant("Ben", "Go", "Ususan", "TCU"),
            ApplicationStatus::Pending,
            at(2025, 8, 2, 8),
        ))
        .expect("insert succeeds");
    let router = router_with_service(service);

    let response = router
        .oneshot(admin_request(
            "GET",
            "/api/v1/applications?semester_id=2025-1&status=approved&search=WAWA",
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("total_items"), Some(&json!(1)));
    assert_eq!(payload["items"][0]["application_id"], json!("x1"));
}

#[tokio::test]
async fn list_route_rejects_unknown_status() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(admin_request("GET", "/api/v1/applications?status=Approved", None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn review_route_maps_illegal_transition_to_conflict() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let record = service.submit(submission()).expect("submission succeeds");
    let router = crate::workflows::scholarship::scholarship_router(service.clone());
    let uri = format!("/api/v1/applications/{}/review", record.application_id);

    let approved = router
        .clone()
        .oneshot(admin_request("POST", &uri, Some(json!({ "decision": "approve" }))))
        .await
        .expect("route executes");
    assert_eq!(approved.status(), StatusCode::OK);

    let again = router
        .oneshot(admin_request(
            "POST",
            &uri,
            Some(json!({ "decision": "reject", "reason": "late" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(admin_request("GET", "/api/v1/applications/app-missing", None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn override_route_updates_effective_status_and_audit() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let record = service.submit(submission()).expect("submission succeeds");
    let router = crate::workflows::scholarship::scholarship_router(service);
    let base = format!("/api/v1/applications/{}/overrides", record.application_id);

    let response = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("{base}/gpa"),
            Some(json!({ "status": "attention", "reason": "grades pending" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["assessments"]["gpa"]["manual"]["status"],
        json!("attention")
    );
    assert_eq!(payload["assessments"]["gpa"]["computed"], json!("passed"));

    let audit = router
        .clone()
        .oneshot(admin_request("GET", &base, None))
        .await
        .expect("route executes");
    let trail = read_json_body(audit).await;
    assert_eq!(trail[0]["criterion"], json!("gpa"));
    assert_eq!(trail[0]["computed"], json!("passed"));
    assert_eq!(trail[0]["overridden_to"], json!("attention"));

    let unknown = router
        .oneshot(admin_request(
            "PUT",
            &format!("{base}/height"),
            Some(json!({ "status": "passed" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn budget_route_reports_remaining() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    service
        .create_release(&admin(), &semester(), release_draft(1_000, Some(5)))
        .expect("release scheduled");
    let router = crate::workflows::scholarship::scholarship_router(service);

    let response = router
        .oneshot(admin_request(
            "GET",
            "/api/v1/semesters/2025-1/budget?budget=10000",
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_active"], json!("5000"));
    assert_eq!(payload["remaining"], json!("5000"));
    assert_eq!(payload["over_budget"], json!(false));
}

#[tokio::test]
async fn release_routes_schedule_and_archive() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let created = router
        .clone()
        .oneshot(admin_request(
            "POST",
            "/api/v1/semesters/2025-1/releases",
            Some(serde_json::to_value(release_draft(750, Some(4))).expect("draft json")),
        ))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let release = read_json_body(created).await;
    let release_id = release["release_id"].as_u64().expect("numeric id");

    let archived = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/releases/{release_id}/archive"),
            Some(json!({ "archived": true })),
        ))
        .await
        .expect("route executes");
    assert_eq!(archived.status(), StatusCode::OK);

    let mut oversized = serde_json::to_value(release_draft(1, Some(4))).expect("draft json");
    oversized["amount_per_student"] = json!("79228162514264337593543950335");
    let rejected = router
        .clone()
        .oneshot(admin_request(
            "POST",
            "/api/v1/semesters/2025-1/releases",
            Some(oversized),
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let listed = router
        .oneshot(admin_request(
            "GET",
            "/api/v1/semesters/2025-1/releases?view=archived",
            None,
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(listed).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    assert_eq!(payload[0]["state"], json!("archived"));
    assert_eq!(payload[0]["done"], json!(true));
}

#[tokio::test]
async fn settings_update_requires_super_admin() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);
    let mut settings = SystemSettings::default();
    settings.maintenance.enabled = true;
    let body = serde_json::to_value(&settings).expect("settings json");

    let forbidden = router
        .clone()
        .oneshot(admin_request("PUT", "/api/v1/settings", Some(body.clone())))
        .await
        .expect("route executes");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let read_forbidden = router
        .clone()
        .oneshot(admin_request("GET", "/api/v1/settings", None))
        .await
        .expect("route executes");
    assert_eq!(read_forbidden.status(), StatusCode::FORBIDDEN);

    let allowed = router
        .clone()
        .oneshot(super_admin_request("PUT", "/api/v1/settings", Some(body)))
        .await
        .expect("route executes");
    assert_eq!(allowed.status(), StatusCode::OK);

    let read = router
        .clone()
        .oneshot(super_admin_request("GET", "/api/v1/settings", None))
        .await
        .expect("route executes");
    assert_eq!(read.status(), StatusCode::OK);
    assert_eq!(read_json_body(read).await["maintenance"]["enabled"], json!(true));

    let audit = router
        .clone()
        .oneshot(super_admin_request("GET", "/api/v1/settings/audit?limit=5", None))
        .await
        .expect("route executes");
    assert_eq!(audit.status(), StatusCode::OK);
    let log = read_json_body(audit).await;
    assert_eq!(log[0]["key"], json!("maintenance.enabled"));
    assert_eq!(log[0]["changed_by"], json!("root-1"));
    assert_eq!(log[0]["new_value"], json!(true));

    let maintenance = router
        .oneshot(
            Request::get("/api/v1/maintenance")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(maintenance).await;
    assert_eq!(payload["maintenance_mode"], json!(true));
    assert!(payload["message"].is_string());
}

#[tokio::test]
async fn export_route_returns_csv_for_super_admin() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    service.submit(submission()).expect("submission succeeds");
    let router = crate::workflows::scholarship::scholarship_router(service);

    let forbidden = router
        .clone()
        .oneshot(admin_request("GET", "/api/v1/exports/applications", None))
        .await
        .expect("route executes");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(super_admin_request(
            "GET",
            "/api/v1/exports/applications?semester_id=2025-1",
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/csv; charset=utf-8")
    );
    let body = read_text_body(response).await;
    assert!(body.starts_with("application_id,user_id,email_address"));
    assert!(body.contains("Maria,Santos"));
}

#[tokio::test]
async fn document_routes_confirm_and_request() {
    let (service, _, notifier) = build_service();
    let service = Arc::new(service);
    let mut pending_papers = submission();
    pending_papers
        .attributes
        .awaiting_documents
        .insert(crate::workflows::scholarship::eligibility::CriterionKind::Residency);
    let record = service.submit(pending_papers).expect("submission succeeds");
    let router = crate::workflows::scholarship::scholarship_router(service);
    let base = format!("/api/v1/applications/{}/documents", record.application_id);

    let confirmed = router
        .clone()
        .oneshot(admin_request("POST", &format!("{base}/residency/confirm"), None))
        .await
        .expect("route executes");
    assert_eq!(confirmed.status(), StatusCode::OK);
    let payload = read_json_body(confirmed).await;
    assert_eq!(payload["attributes"]["awaiting_documents"], json!([]));
    assert_eq!(payload["documents"]["residency"]["status"], json!("verified"));

    let requested = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("{base}/age/request"),
            Some(json!({ "status": "denied", "note": "birth certificate unreadable" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(requested.status(), StatusCode::OK);
    let payload = read_json_body(requested).await;
    assert_eq!(payload["attributes"]["awaiting_documents"], json!(["age"]));
    assert_eq!(payload["documents"]["age"]["status"], json!("denied"));
    assert_eq!(notifier.events()[0].template, "document_denied");

    let verified = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("{base}/age/request"),
            Some(json!({ "status": "verified" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(verified.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = router
        .oneshot(admin_request("POST", &format!("{base}/height/confirm"), None))
        .await
        .expect("route executes");
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn history_route_lists_user_applications() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let record = service.submit(submission()).expect("submission succeeds");
    let router = crate::workflows::scholarship::scholarship_router(service);

    let response = router
        .oneshot(admin_request("GET", "/api/v1/users/user-1/history", None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user_id"], json!("user-1"));
    assert_eq!(
        payload["applications"][0]["application_id"],
        json!(record.application_id.0)
    );
    assert_eq!(payload["releases"], json!([]));
}

#[tokio::test]
async fn reset_route_is_guarded() {
    let (service, store, _) = build_service();
    store
        .insert(stored_record(
            "reset-1",
            applicant("Ana", "Lim", "Wawa", "TCU"),
            ApplicationStatus::Pending,
            at(2025, 7, 1, 8),
        ))
        .expect("insert succeeds");
    let router = router_with_service(service);
    let uri = "/api/v1/semesters/2025-1/reset";

    let forbidden = router
        .clone()
        .oneshot(admin_request("POST", uri, Some(json!({ "confirmation": "DELETE" }))))
        .await
        .expect("route executes");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let mismatch = router
        .clone()
        .oneshot(super_admin_request("POST", uri, Some(json!({ "confirmation": "yes" }))))
        .await
        .expect("route executes");
    assert_eq!(mismatch.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let open = router
        .clone()
        .oneshot(super_admin_request("POST", uri, Some(json!({ "confirmation": "DELETE" }))))
        .await
        .expect("route executes");
    assert_eq!(open.status(), StatusCode::CONFLICT);

    let mut settings = SystemSettings::default();
    settings.features.open_applications = false;
    let closed = router
        .clone()
        .oneshot(super_admin_request(
            "PUT",
            "/api/v1/settings",
            Some(serde_json::to_value(&settings).expect("settings json")),
        ))
        .await
        .expect("route executes");
    assert_eq!(closed.status(), StatusCode::OK);

    let reset = router
        .oneshot(super_admin_request("POST", uri, Some(json!({ "confirmation": "DELETE" }))))
        .await
        .expect("route executes");
    assert_eq!(reset.status(), StatusCode::OK);
    let payload = read_json_body(reset).await;
    assert_eq!(payload["deleted_count"], json!(1));
    assert_eq!(payload["semester_id"], json!("2025-1"));
}
