use mimalloc::MiMalloc;
use rollcall::api::DeepFaceClient;
use rollcall::config::Config;
use rollcall::db::AttendanceStore;
use rollcall::router::{AppState, RouterOptions, attendance_router};
use rollcall::service::{
    AdminAuth, AttendanceService, FaceRecognizer, ImageStore, PasswordAuthenticator,
    ReportingService,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.storage.database_url,
        faces_dir = %cfg.storage.faces_dir.display(),
        recognition = %cfg.recognition.service_url,
        model = %cfg.recognition.model_name,
        loglevel = %cfg.basic.loglevel,
    );
    if cfg.basic.admin_password == rollcall::config::BasicConfig::default().admin_password {
        warn!("admin password is the built-in default; set ROLLCALL_BASIC__ADMIN_PASSWORD");
    }

    let store = AttendanceStore::connect(&cfg.storage.database_url).await?;
    let images = ImageStore::from_config(&cfg.storage);
    images.ensure_dirs().await?;

    let recognizer: Arc<dyn FaceRecognizer> = Arc::new(DeepFaceClient::new(&cfg.recognition)?);
    let authenticator = Arc::new(PasswordAuthenticator::new(&cfg.basic.admin_password));

    let state = AppState::new(
        AttendanceService::new(store.clone(), images, recognizer),
        ReportingService::new(store.clone()),
        AdminAuth::new(authenticator, store),
    );
    let options = RouterOptions {
        max_body_bytes: cfg.basic.max_body_bytes,
        cors_origins: cfg.basic.cors_origins.clone(),
    };
    let app = attendance_router(state, &options);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
