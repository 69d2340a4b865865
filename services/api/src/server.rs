use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryStore, LoggingNotifier};
use crate::routes::with_scholarship_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use iskolar::config::AppConfig;
use iskolar::error::AppError;
use iskolar::telemetry;
use iskolar::workflows::scholarship::{CriteriaConfig, EligibilityEvaluator, ScholarshipService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::default());
    let notifier = Arc::new(LoggingNotifier::default());
    let evaluator = EligibilityEvaluator::new(CriteriaConfig::default())
        .map_err(|err| AppError::Service(err.into()))?;
    let service = Arc::new(
        ScholarshipService::new(store, notifier, evaluator)
            .with_page_size(config.listing.page_size),
    );

    let app = with_scholarship_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        page_size = config.listing.page_size,
        "scholarship back office ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
