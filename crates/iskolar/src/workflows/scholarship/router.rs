use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::disbursement::{Release, ReleaseDraft, ReleaseId, ReleaseView};
use super::domain::{
    AdminContext, AdminRole, ApplicationId, ApplicationSubmission, DocumentRequest,
    ReviewDecision, SemesterId, UserId,
};
use super::eligibility::{CriteriaConfig, CriterionKind, CriterionStatus};
use super::listing::{ApplicationFilter, StatusFilter};
use super::repository::{
    ApplicationRepository, NotificationPublisher, ReleaseRepository, RepositoryError,
};
use super::service::{ScholarshipService, ScholarshipServiceError};
use super::settings::SystemSettings;

pub const ADMIN_ID_HEADER: &str = "x-admin-id";
pub const ADMIN_EMAIL_HEADER: &str = "x-admin-email";
pub const ADMIN_ROLE_HEADER: &str = "x-admin-role";

type SharedService<S, N> = Arc<ScholarshipService<S, N>>;

/// Router builder exposing the back-office endpoints.
pub fn scholarship_router<S, N>(service: SharedService<S, N>) -> Router
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<S, N>).get(list_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<S, N>).delete(delete_application_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/review",
            post(review_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/evaluate",
            post(evaluate_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/overrides",
            get(audit_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/overrides/:criterion",
            put(override_handler::<S, N>).delete(clear_override_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents/:criterion/confirm",
            post(confirm_document_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents/:criterion/request",
            post(request_document_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/history",
            get(history_handler::<S, N>),
        )
        .route(
            "/api/v1/criteria",
            get(criteria_handler::<S, N>).put(update_criteria_handler::<S, N>),
        )
        .route(
            "/api/v1/semesters/:semester_id/releases",
            get(releases_handler::<S, N>).post(create_release_handler::<S, N>),
        )
        .route(
            "/api/v1/semesters/:semester_id/budget",
            get(budget_handler::<S, N>),
        )
        .route(
            "/api/v1/semesters/:semester_id/reset",
            post(reset_semester_handler::<S, N>),
        )
        .route(
            "/api/v1/releases/:release_id",
            put(edit_release_handler::<S, N>).delete(delete_release_handler::<S, N>),
        )
        .route(
            "/api/v1/releases/:release_id/archive",
            post(archive_handler::<S, N>),
        )
        .route(
            "/api/v1/settings",
            get(settings_handler::<S, N>).put(update_settings_handler::<S, N>),
        )
        .route(
            "/api/v1/settings/audit",
            get(settings_audit_handler::<S, N>),
        )
        .route("/api/v1/maintenance", get(maintenance_handler::<S, N>))
        .route(
            "/api/v1/exports/applications",
            get(export_handler::<S, N>),
        )
        .with_state(service)
}

/// Caller identity forwarded by the upstream auth proxy. A missing role
/// header means a regular administrator.
pub fn admin_context(headers: &HeaderMap) -> Result<AdminContext, Response> {
    let admin_id = header_value(headers, ADMIN_ID_HEADER).ok_or_else(unauthorized)?;
    let role = match header_value(headers, ADMIN_ROLE_HEADER) {
        None => AdminRole::Admin,
        Some(raw) => AdminRole::parse(raw).ok_or_else(unauthorized)?,
    };

    Ok(AdminContext {
        admin_id: admin_id.to_string(),
        email: header_value(headers, ADMIN_EMAIL_HEADER).map(str::to_string),
        role,
    })
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "administrator identity required" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn unprocessable(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

pub(crate) fn error_response(error: ScholarshipServiceError) -> Response {
    let status = match &error {
        ScholarshipServiceError::Validation(_)
        | ScholarshipServiceError::Criteria(_)
        | ScholarshipServiceError::Override(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScholarshipServiceError::Transition(_)
        | ScholarshipServiceError::SemesterAcceptingApplications(_)
        | ScholarshipServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ScholarshipServiceError::ApplicationsClosed
        | ScholarshipServiceError::DeletionDisabled
        | ScholarshipServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ScholarshipServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ScholarshipServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ScholarshipServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, ScholarshipServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service.submit(submission).map(|record| record.summary());
    respond(StatusCode::CREATED, result)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    pub(crate) semester_id: Option<String>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) submitted_from: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) submitted_to: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) page: Option<usize>,
}

pub(crate) async fn list_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }

    let status = match params.status.as_deref() {
        None | Some("") => StatusFilter::All,
        Some(raw) => match StatusFilter::parse(raw) {
            Some(status) => status,
            None => return unprocessable(format!("unknown status filter '{raw}'")),
        },
    };
    let filter = ApplicationFilter {
        search: params.search,
        submitted_from: params.submitted_from,
        submitted_to: params.submitted_to,
        status,
    };
    let semester = params.semester_id.map(SemesterId);

    respond(
        StatusCode::OK,
        service.list_applications(semester.as_ref(), &filter, params.page.unwrap_or(1)),
    )
}

pub(crate) async fn application_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    respond(StatusCode::OK, service.get(&ApplicationId(application_id)))
}

pub(crate) async fn delete_application_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service.delete_application(&ctx, &ApplicationId(application_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.review(&ctx, &ApplicationId(application_id), decision),
    )
}

pub(crate) async fn evaluate_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    respond(StatusCode::OK, service.evaluate(&ApplicationId(application_id)))
}

pub(crate) async fn audit_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    let result = service
        .get(&ApplicationId(application_id))
        .map(|record| record.eligibility.history);
    respond(StatusCode::OK, result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideRequest {
    pub(crate) status: CriterionStatus,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn override_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path((application_id, criterion)): Path<(String, String)>,
    Json(request): Json<OverrideRequest>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(criterion) = CriterionKind::parse(&criterion) else {
        return unprocessable(format!("unknown criterion '{criterion}'"));
    };
    respond(
        StatusCode::OK,
        service.override_criterion(
            &ctx,
            &ApplicationId(application_id),
            criterion,
            request.status,
            request.reason,
        ),
    )
}

pub(crate) async fn clear_override_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path((application_id, criterion)): Path<(String, String)>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(criterion) = CriterionKind::parse(&criterion) else {
        return unprocessable(format!("unknown criterion '{criterion}'"));
    };
    respond(
        StatusCode::OK,
        service.clear_override(&ctx, &ApplicationId(application_id), criterion),
    )
}

pub(crate) async fn confirm_document_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path((application_id, criterion)): Path<(String, String)>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(criterion) = CriterionKind::parse(&criterion) else {
        return unprocessable(format!("unknown criterion '{criterion}'"));
    };
    respond(
        StatusCode::OK,
        service.confirm_document(&ctx, &ApplicationId(application_id), criterion),
    )
}

pub(crate) async fn request_document_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path((application_id, criterion)): Path<(String, String)>,
    Json(request): Json<DocumentRequest>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(criterion) = CriterionKind::parse(&criterion) else {
        return unprocessable(format!("unknown criterion '{criterion}'"));
    };
    respond(
        StatusCode::OK,
        service.request_document(&ctx, &ApplicationId(application_id), criterion, request),
    )
}

pub(crate) async fn history_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    respond(StatusCode::OK, service.applicant_history(&UserId(user_id)))
}

pub(crate) async fn criteria_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    (StatusCode::OK, Json(service.criteria())).into_response()
}

pub(crate) async fn update_criteria_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Json(config): Json<CriteriaConfig>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.update_criteria(&ctx, config))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReleaseParams {
    #[serde(default)]
    pub(crate) view: ReleaseView,
}

/// Release row with the "done" marker used by the schedule tabs.
#[derive(Debug, Serialize)]
pub(crate) struct ReleaseEntry {
    #[serde(flatten)]
    pub(crate) release: Release,
    pub(crate) done: bool,
}

pub(crate) async fn releases_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(semester_id): Path<String>,
    Query(params): Query<ReleaseParams>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    let now = Local::now().naive_local();
    let result = service
        .releases(&SemesterId(semester_id), params.view)
        .map(|releases| {
            releases
                .into_iter()
                .map(|release| ReleaseEntry {
                    done: release.is_done(now),
                    release,
                })
                .collect::<Vec<_>>()
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_release_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(semester_id): Path<String>,
    Json(draft): Json<ReleaseDraft>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.create_release(&ctx, &SemesterId(semester_id), draft),
    )
}

pub(crate) async fn edit_release_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(release_id): Path<u64>,
    Json(draft): Json<ReleaseDraft>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.edit_release(&ctx, ReleaseId(release_id), draft),
    )
}

pub(crate) async fn delete_release_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(release_id): Path<u64>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service.delete_release(&ctx, ReleaseId(release_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArchiveRequest {
    pub(crate) archived: bool,
}

pub(crate) async fn archive_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(release_id): Path<u64>,
    Json(request): Json<ArchiveRequest>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.set_archived(&ctx, ReleaseId(release_id), request.archived),
    )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BudgetParams {
    #[serde(default)]
    pub(crate) budget: Option<Decimal>,
}

pub(crate) async fn budget_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(semester_id): Path<String>,
    Query(params): Query<BudgetParams>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    respond(
        StatusCode::OK,
        service.budget_summary(&SemesterId(semester_id), params.budget),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetRequest {
    #[serde(default)]
    pub(crate) confirmation: String,
}

pub(crate) async fn reset_semester_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Path(semester_id): Path<String>,
    Json(request): Json<ResetRequest>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.reset_semester(&ctx, &SemesterId(semester_id), &request.confirmation),
    )
}

pub(crate) async fn settings_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.settings(&ctx))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditParams {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn settings_audit_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Query(params): Query<AuditParams>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.settings_audit(&ctx, params.limit))
}

pub(crate) async fn update_settings_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Json(settings): Json<SystemSettings>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.update_settings(&ctx, settings))
}

pub(crate) async fn maintenance_handler<S, N>(
    State(service): State<SharedService<S, N>>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    (StatusCode::OK, Json(service.maintenance_status())).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportParams {
    #[serde(default)]
    pub(crate) semester_id: Option<String>,
}

pub(crate) async fn export_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    headers: HeaderMap,
    Query(params): Query<ExportParams>,
) -> Response
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = match admin_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let semester = params.semester_id.map(SemesterId);
    match service.export_applications(&ctx, semester.as_ref()) {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"applications.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}
