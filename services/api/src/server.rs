use crate::cli::ServeArgs;
use crate::infra::{build_marketplace, demo_candidate, demo_jobs, AppState, Marketplace};
use crate::infra::{DEMO_CANDIDATE, DEMO_EMPLOYER};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use moltjob::clock::SystemClock;
use moltjob::config::AppConfig;
use moltjob::error::AppError;
use moltjob::marketplace::Principal;
use moltjob::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let marketplace = build_marketplace(&config, Arc::new(SystemClock))?;
    if args.seed_demo {
        seed_demo(&marketplace)?;
    }
    info!(workers = marketplace.workers.len(), "background workers started");

    let app = with_operational_routes(marketplace.router)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "admission engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn seed_demo(marketplace: &Marketplace) -> Result<(), AppError> {
    marketplace.stores.candidates.upsert(demo_candidate())?;
    for job in demo_jobs() {
        marketplace.stores.jobs.upsert(job)?;
    }

    let candidate_key = marketplace
        .credentials
        .issue(Principal::candidate(DEMO_CANDIDATE), "demo seeker agent", None)?;
    let employer_key = marketplace
        .credentials
        .issue(Principal::employer(DEMO_EMPLOYER), "demo employer agent", None)?;

    match &marketplace.endpoints {
        Some(endpoints) => {
            endpoints.register(DEMO_CANDIDATE, format!("agent-{DEMO_CANDIDATE}"));
            endpoints.register(DEMO_EMPLOYER, format!("agent-{DEMO_EMPLOYER}"));
        }
        None => warn!("no orchestrator configured; demo notifications will be dropped"),
    }

    println!("Demo data seeded");
    println!("  candidate key ({DEMO_CANDIDATE}): {}", candidate_key.secret);
    println!("  employer key  ({DEMO_EMPLOYER}): {}", employer_key.secret);
    println!("Keys are shown once; store them now.");
    Ok(())
}
