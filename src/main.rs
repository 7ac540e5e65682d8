use std::{process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use tweetreach::{
    application::{
        engagement::{EngagementResult, EngagementService},
        error::AppError,
        freshness::TtlPolicy,
        pipeline::AggregationPipeline,
        repos::EngagementStore,
    },
    config,
    infra::{
        db::PostgresEngagementStore,
        error::InfraError,
        http::{self, EngagementEnvelope, HttpState},
        memory::InMemoryEngagementStore,
        provider::ProviderCalculator,
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    let engagement = build_engagement_service(&settings).await?;

    match command {
        config::Command::Serve(_) => serve_http(&settings, HttpState { engagement }).await,
        config::Command::Calculate(args) => run_calculate(&engagement, &args.query).await,
    }
}

async fn init_store(settings: &config::Settings) -> Result<Arc<dyn EngagementStore>, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            capacity = settings.cache.memory_capacity.get(),
            "no database configured; engagements are kept in memory"
        );
        return Ok(Arc::new(InMemoryEngagementStore::new(
            settings.cache.memory_capacity,
        )));
    };

    let pool =
        PostgresEngagementStore::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresEngagementStore::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresEngagementStore::new(pool)))
}

async fn build_engagement_service(
    settings: &config::Settings,
) -> Result<EngagementService, AppError> {
    let store = init_store(settings).await?;
    let calculator = ProviderCalculator::new(&settings.provider)?;
    let pipeline = AggregationPipeline::new(Arc::new(calculator));
    let policy = Arc::new(TtlPolicy::new(settings.cache.ttl));

    Ok(EngagementService::new(store, policy, pipeline)
        .with_wait_timeout(settings.cache.wait_timeout))
}

async fn run_calculate(engagement: &EngagementService, query: &str) -> Result<(), AppError> {
    let envelope = match engagement.calculate_engagement(query).await {
        EngagementResult::Served {
            id,
            total_reach,
            share_details,
        } => EngagementEnvelope::served(id, total_reach, share_details),
        EngagementResult::NoEngagement { .. } => EngagementEnvelope::not_shared(),
        EngagementResult::Failed(failure) => return Err(failure.into()),
    };

    let rendered = serde_json::to_string_pretty(&envelope)
        .map_err(|err| AppError::unexpected(format!("failed to render result: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
