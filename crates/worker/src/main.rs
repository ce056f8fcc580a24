//! Background worker binary: runs the submission worker and status poller.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fabula_pipeline::{Poller, SubmitWorker};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fabula_worker=debug,fabula_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fabula_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fabula_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    let providers = fabula_pipeline::bootstrap::build_registry(&pool)
        .await
        .expect("Provider registry self-check failed");

    let cancel = CancellationToken::new();

    let submit_worker = SubmitWorker::new(pool.clone(), Arc::clone(&providers));
    let submit_cancel = cancel.clone();
    let submit_handle = tokio::spawn(async move {
        submit_worker.run(submit_cancel).await;
    });

    let poller = Poller::new(pool.clone(), Arc::clone(&providers));
    let poller_cancel = cancel.clone();
    let poller_handle = tokio::spawn(async move {
        poller.run(poller_cancel).await;
    });

    tracing::info!("Worker started (submission worker, status poller)");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl-C handler");
    tracing::info!("Received shutdown signal, stopping workers");

    cancel.cancel();
    let _ = submit_handle.await;
    let _ = poller_handle.await;

    tracing::info!("Worker shutdown complete");
}
