// main.rs - HTTP service for datacenter power calculation
use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer,
};
use actix_web::http::header;
use actix_cors::Cors;
use actix_files::Files;
use anyhow::Context;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod aggregation;
mod calculator;
mod coercion;
mod config;
mod error;
mod handlers;
mod import_export;
mod models;
mod monitoring;
mod presentation;
mod report;
mod store;
pub mod validator;

use calculator::Calculator;
use config::{load_config, Config};
use error::{ApiError, ApiResult};
use monitoring::{Metrics, RequestLogger};

pub struct AppState {
    pub calculator: RwLock<Calculator>,
    pub config: Config,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            calculator: RwLock::new(Calculator::new(&config.import)),
            config,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn read_calculator(&self) -> ApiResult<RwLockReadGuard<'_, Calculator>> {
        self.calculator
            .read()
            .map_err(|_| ApiError::InternalServerError("Calculator state is poisoned".to_string()))
    }

    pub fn write_calculator(&self) -> ApiResult<RwLockWriteGuard<'_, Calculator>> {
        self.calculator
            .write()
            .map_err(|_| ApiError::InternalServerError("Calculator state is poisoned".to_string()))
    }
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    let app_state = Arc::new(AppState::new(config.clone()));
    let metrics_arc = app_state.metrics.clone();
    let metrics = web::Data::from(metrics_arc.clone());

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let server_config = config.server.clone();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&config.security.allowed_origins, config.is_production());
        let security_headers = setup_security_headers(&config.security);
        // multipart bodies carry some framing on top of the file itself
        let payload_limit = config.security.max_upload_bytes + 64 * 1024;

        let app = App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(metrics.clone())
            .app_data(web::PayloadConfig::new(payload_limit))
            .app_data(web::JsonConfig::default().limit(payload_limit))

            .service(
                web::scope("/health")
                    .route("", web::get().to(monitoring::health_check))
                    .route("/metrics", web::get().to(monitoring::metrics_endpoint))
            )

            .service(
                web::scope("/api/v1")
                    .route("/templates/{category}", web::get().to(import_export::download_template))
                    .service(
                        web::scope("/inventories")
                            .route("/{category}", web::get().to(handlers::list_inventory))
                            .route("/{category}/upload", web::post().to(import_export::upload_inventory))
                            .route("/{category}/json", web::post().to(import_export::import_inventory_json))
                            .route("/{category}/{index}/quantity", web::put().to(handlers::set_quantity))
                    )
                    .route("/status", web::get().to(handlers::get_status))
                    .route("/calculate", web::post().to(handlers::calculate))
                    .route("/results", web::get().to(handlers::get_results))
                    .route("/results/chart", web::get().to(handlers::get_chart))
                    .service(
                        web::scope("/export")
                            .route("/csv", web::get().to(import_export::export_csv))
                            .route("/html", web::get().to(import_export::export_html))
                            .route("/text", web::get().to(import_export::export_text))
                    )
            );

        // front-end goes last so it never shadows the API
        if let Some(dir) = config.static_dir.as_deref() {
            app.service(Files::new("/", dir).index_file("index.html"))
        } else {
            app
        }
    })
        .keep_alive(std::time::Duration::from_secs(server_config.keep_alive))
        .client_request_timeout(std::time::Duration::from_secs(server_config.client_timeout));

    if let Some(workers) = server_config.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

pub fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::USER_AGENT,
            header::REFERER,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH, header::CONTENT_DISPOSITION])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("⚠️  Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty() && o.as_str() != "*") {
            log::debug!("Adding CORS origin: {}", origin);
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to initialise logging")?;
    }

    Ok(())
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload"
        ));
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::HttpResponse;
    use actix_web::test::{call_service, init_service, TestRequest};

    #[actix_rt::test]
    async fn test_security_headers() {
        let mut security = config::SecurityConfig::default();
        security.require_https = true;

        let app = init_service(
            App::new()
                .wrap(setup_security_headers(&security))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let resp = call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
        assert!(resp.headers().contains_key("strict-transport-security"));
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let state = Arc::new(AppState::new(Config::default()));
        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.calculator.write().unwrap();
            panic!("poison the calculator lock");
        })
        .join();

        assert!(matches!(state.read_calculator(), Err(ApiError::InternalServerError(_))));
    }
}
