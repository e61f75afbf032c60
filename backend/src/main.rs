use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use backend::config::AppConfig;
use backend::detection::roboflow_service::RoboflowService;
use backend::imaging::annotation::AnnotationRenderer;
use backend::pipeline::pipeline_service::PipelineService;
use backend::report::gemini_service::GeminiService;
use backend::report::report_service::ReportGenerator;
use backend::routes::{UploadLimit, configure_routes};
use backend::storage::artifact_store::ArtifactStore;
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::load().map_err(|e| startup_error("Configuration error", e))?;

    let frontend_dir = config.server.frontend_dir.clone().or_else(|| {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").ok()?;
        let dist = PathBuf::from(format!("{}/../frontend/dist", manifest_dir));
        dist.exists().then_some(dist)
    });

    let store = ArtifactStore::new(&config.server.storage_dir, &config.server.public_base_url);
    store
        .ensure_root()
        .await
        .map_err(|e| startup_error("Cannot prepare storage directory", e))?;
    log::info!("Storing artifacts in {}", store.root().display());

    let detector = RoboflowService::new(&config.detection)
        .map_err(|e| startup_error("Cannot create detection client", e))?;
    let generator = GeminiService::new(&config.report)
        .map_err(|e| startup_error("Cannot create report client", e))?;
    if config.report.api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set; reports will fall back to the error text");
    }
    log::info!(
        "Detection endpoint {} (failure policy: {:?}), report model {}",
        config.detection.endpoint,
        config.detection.on_failure,
        generator.model()
    );

    let renderer = AnnotationRenderer::from_config(&config.annotation)
        .map_err(|e| startup_error("Cannot load label font", e))?;
    let pipeline = PipelineService::new(
        store,
        Arc::new(detector),
        ReportGenerator::new(Arc::new(generator)),
        Arc::new(renderer),
        config.detection.on_failure,
    );

    let storage_dir = config.server.storage_dir.clone();
    let upload_limit = UploadLimit(config.server.max_upload_bytes);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allow_any_header()
                    .max_age(3600),
            )
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(upload_limit))
            .configure(|cfg| configure_routes(cfg, &storage_dir, frontend_dir.as_deref()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
