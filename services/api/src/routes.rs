use crate::infra::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use chrono::Local;
use iskolar::error::AppError;
use iskolar::workflows::scholarship::{
    admin_context, format_peso, parse_releases, scholarship_router, ApplicationRepository,
    BudgetSummary, NotificationPublisher, ReleaseRepository, ScholarshipService, SemesterBudget,
    SemesterId, ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

/// Ad-hoc reconciliation of a release schedule export, without touching the store.
#[derive(Debug, Deserialize)]
pub(crate) struct BudgetReportRequest {
    pub(crate) semester_id: String,
    pub(crate) budget: Decimal,
    pub(crate) releases_csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BudgetReportResponse {
    #[serde(flatten)]
    pub(crate) summary: BudgetSummary,
    pub(crate) total_active_display: String,
    pub(crate) remaining_display: String,
    pub(crate) upcoming_releases: usize,
}

pub(crate) fn with_scholarship_routes<S, N>(
    service: Arc<ScholarshipService<S, N>>,
) -> axum::Router
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    scholarship_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/budget/report",
            axum::routing::post(budget_report_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn budget_report_endpoint(
    headers: HeaderMap,
    Json(payload): Json<BudgetReportRequest>,
) -> Response {
    if let Err(response) = admin_context(&headers) {
        return response;
    }
    match budget_report(payload) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn budget_report(payload: BudgetReportRequest) -> Result<BudgetReportResponse, AppError> {
    let BudgetReportRequest {
        semester_id,
        budget,
        releases_csv,
    } = payload;

    let semester_id = SemesterId(semester_id);
    let budget = SemesterBudget::new(budget).map_err(service_error)?;
    let releases = parse_releases(Cursor::new(releases_csv.into_bytes()), &semester_id)?;

    let now = Local::now().naive_local();
    let upcoming_releases = releases
        .iter()
        .filter(|release| !release.is_archived() && !release.is_done(now))
        .count();
    let summary = BudgetSummary::compute(semester_id, Some(budget), &releases);

    Ok(BudgetReportResponse {
        total_active_display: format_peso(summary.total_active),
        remaining_display: format_peso(summary.remaining.unwrap_or(budget.ceiling())),
        upcoming_releases,
        summary,
    })
}

fn service_error(err: ValidationError) -> AppError {
    AppError::Service(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::HeaderValue;
    use axum::Json;
    use serde_json::Value;

    const SCHEDULE: &str = "release_type,release_date,release_time,barangay,location,amount_per_student,recipients,archived\n\
allowance,2025-09-01,09:00,Ususan,Hall,1000,5,false\n\
books,2025-08-01,13:00,Wawa,Gym,2000,2,true\n";

    fn request(budget: i64, releases_csv: String) -> BudgetReportRequest {
        BudgetReportRequest {
            semester_id: "2025-1".to_string(),
            budget: Decimal::from(budget),
            releases_csv,
        }
    }

    fn admin_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-id", HeaderValue::from_static("admin-7"));
        headers
    }

    #[tokio::test]
    async fn budget_report_endpoint_reconciles_schedule() {
        let response =
            budget_report_endpoint(admin_headers(), Json(request(10_000, SCHEDULE.to_string())))
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["total_active_display"], "₱5,000.00");
        assert_eq!(body["remaining_display"], "₱5,000.00");
        assert_eq!(body["archived_releases"], 1);
        assert_eq!(body["over_budget"], false);
    }

    #[tokio::test]
    async fn budget_report_endpoint_requires_admin_identity() {
        let response =
            budget_report_endpoint(HeaderMap::new(), Json(request(10_000, SCHEDULE.to_string())))
                .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn budget_report_endpoint_rejects_malformed_rows() {
        let csv = format!("{SCHEDULE}allowance,not-a-date,09:00,Ususan,Hall,1000,5,false\n");
        let response = budget_report_endpoint(admin_headers(), Json(request(10_000, csv))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn budget_report_rejects_negative_budget() {
        let response = budget_report(request(-1, SCHEDULE.to_string()))
            .expect_err("negative budget")
            .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
