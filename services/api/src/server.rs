use crate::cli::ServeArgs;
use crate::infra::{AppState, DirectoryStore, FileDocument, LoggingListener};
use crate::routes::with_document_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use insertion_gate::config::AppConfig;
use insertion_gate::error::AppError;
use insertion_gate::insertion::{
    DocumentInserter, InsertionDelay, LockableFingerprintProvider, ModificationDetector,
};
use insertion_gate::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(document) = args.document.take() {
        config.insertion.document_path = document;
    }
    if let Some(store) = args.store.take() {
        config.insertion.store_dir = store;
    }
    if let Some(delay) = args.insertion_delay.take() {
        config.insertion.insertion_delay_secs = delay;
    }
    if let Some(millis) = args.poll_interval_ms.take() {
        config.insertion.poll_interval = Duration::from_millis(millis);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let document = Arc::new(FileDocument::new(&config.insertion.document_path));
    let store = DirectoryStore::new(document.clone(), &config.insertion.store_dir);
    let current = document.fingerprint();
    let already_inserted = store.contains(&current);

    let detector = ModificationDetector::new(
        document,
        InsertionDelay::new(config.insertion.insertion_delay_secs),
    );
    let inserter = Arc::new(
        DocumentInserter::new(detector, store).with_listener(Arc::new(LoggingListener)),
    );
    if already_inserted {
        inserter.restore_last_insert(current);
    }

    let app = with_document_routes(inserter.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(inserter.clone().run(
        config.insertion.poll_interval,
        wait_for_shutdown(shutdown_rx),
    ));

    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        document = %config.insertion.document_path.display(),
        insertion_delay = config.insertion.insertion_delay_secs,
        "insertion gate ready"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "unable to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            readiness_flag.store(false, Ordering::Release);
            let _ = shutdown_tx.send(true);
        })
        .await;

    if let Err(err) = poller.await {
        warn!(error = %err, "document inserter task ended abnormally");
    }
    served?;
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}
