use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use wavecache::{
    application::{
        error::AppError,
        gateways::{ComputeBackend, ResponseBroker, RulesetDirectory},
        invalidation::{InvalidationService, SpatialRadiusPolicy},
        jobs::{ReclaimContext, process_reclaim_stuck_job, reclaim_schedule},
        lookup::LookupService,
        precompute::{PrecomputeQuota, PrecomputeService, PrecomputeSettings},
        repos::{EntriesRepo, SwitchesRepo},
        status::StatusService,
    },
    config,
    infra::{
        broker::PgResponseBroker,
        compute::HttpComputeEngine,
        db::PostgresRepositories,
        directory::HttpRulesetDirectory,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    // Startup sweep: recover rows a dead worker left in `precomputing`.
    let reclaimed = app.precompute.reclaim_stuck().await.map_err(AppError::from)?;
    if reclaimed > 0 {
        info!(
            target = "wavecache::startup",
            reclaimed, "recovered stranded precompute claims"
        );
    }

    let scheduler_handle = tokio::spawn(app.precompute.clone().run());
    let monitor_handle = spawn_job_monitor(app.precompute.clone());

    let result = serve_http(&settings, app.api_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;
    scheduler_handle.abort();
    let _ = scheduler_handle.await;

    result
}

struct ApplicationContext {
    api_state: ApiState,
    precompute: Arc<PrecomputeService>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let entries_repo: Arc<dyn EntriesRepo> = repositories.clone();
    let switches_repo: Arc<dyn SwitchesRepo> = repositories.clone();

    let broker: Arc<dyn ResponseBroker> = Arc::new(PgResponseBroker::new(
        repositories.pool().clone(),
        settings.broker.channel_prefix.clone(),
    ));

    let compute_url = settings
        .compute
        .url
        .clone()
        .ok_or_else(|| InfraError::configuration("compute url is not configured"))
        .map_err(AppError::from)?;
    let compute: Arc<dyn ComputeBackend> = Arc::new(
        HttpComputeEngine::new(compute_url, settings.compute.timeout).map_err(AppError::from)?,
    );

    let directory: Option<Arc<dyn RulesetDirectory>> =
        match settings.invalidation.ruleset_directory_url.clone() {
            Some(url) => Some(Arc::new(
                HttpRulesetDirectory::new(url).map_err(AppError::from)?,
            )),
            None => None,
        };

    let lookup = Arc::new(LookupService::new(
        entries_repo.clone(),
        switches_repo.clone(),
        broker,
    ));
    let invalidation = Arc::new(InvalidationService::new(
        entries_repo.clone(),
        switches_repo.clone(),
        SpatialRadiusPolicy::new(directory, settings.invalidation.default_radius_km),
    ));

    let quota = PrecomputeQuota::new(settings.precompute.quota.get());
    let max_attempts = i32::try_from(settings.precompute.max_attempts).unwrap_or(i32::MAX);
    let precompute = Arc::new(PrecomputeService::new(
        entries_repo.clone(),
        switches_repo.clone(),
        compute,
        lookup.clone(),
        quota.clone(),
        PrecomputeSettings {
            scan_interval: settings.precompute.scan_interval,
            batch: settings.precompute.batch.get(),
            max_attempts,
            reclaim_after: settings.precompute.reclaim_after,
        },
    ));

    let status = Arc::new(StatusService::new(
        entries_repo,
        switches_repo.clone(),
        quota.clone(),
    ));

    let api_state = ApiState {
        status,
        lookup,
        invalidation,
        switches: switches_repo,
        quota,
    };

    Ok(ApplicationContext {
        api_state,
        precompute,
    })
}

fn spawn_job_monitor(precompute: Arc<PrecomputeService>) -> tokio::task::JoinHandle<()> {
    let reclaim_ctx = ReclaimContext { precompute };
    let reclaim_worker = WorkerBuilder::new("reclaim-stuck-worker")
        .data(reclaim_ctx)
        .backend(CronStream::new(reclaim_schedule()))
        .build_fn(process_reclaim_stuck_job);

    let monitor = Monitor::new().register(reclaim_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, api_state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(api_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "wavecache::http", addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
