mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use tenun_api::ocr::TesseractCli;
use tenun_api::openai::{OpenAiClient, OpenAiConfig};
use tenun_api::vision::{ModelMetadata, TfServingModel};
use tenun_api::{AppStateInner, build_router};
use tenun_db::Database;
use tenun_db::seed::CatalogSeed;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tenun=debug,tenun_api=debug,tenun_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    if let Some(path) = &config.catalog_seed {
        let seed = CatalogSeed::from_file(path)?;
        let (weavers, products) = db.seed_catalog(&seed)?;
        info!(
            "Catalog seed {}: {} new weavers, {} new products",
            path.display(),
            weavers,
            products
        );
    }

    let mut state = AppStateInner::new(db)?
        .with_ocr(Arc::new(TesseractCli::new(
            config.ocr_binary.clone(),
            config.ocr_language.clone(),
            config.upstream_timeout,
        )))
        .with_strict_status(config.strict_status);

    match &config.openai_api_key {
        Some(api_key) => {
            let client = Arc::new(OpenAiClient::new(OpenAiConfig {
                api_key: api_key.clone(),
                base_url: config.openai_base_url.clone(),
                chat_model: config.chat_model.clone(),
                speech_model: config.speech_model.clone(),
                timeout: config.upstream_timeout,
            })?);
            state = state.with_text_generator(client.clone()).with_speech(client);
            info!("Text generation enabled with model {}", config.chat_model);
        }
        None => warn!("OPENAI_API_KEY not set, chat, translation and TTS are disabled"),
    }

    match &config.model_url {
        Some(url) => {
            let metadata = ModelMetadata::load_or_default(&config.model_metadata)?;
            let model = TfServingModel::new(url, &config.model_name, &metadata, config.upstream_timeout)?;
            state = state.with_classifier(Arc::new(model));
            info!("Classification model {} served from {}", config.model_name, url);
        }
        None => warn!("TENUN_MODEL_URL not set, classification is disabled"),
    }

    let origin: HeaderValue = config.cors_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let app = build_router(state.into_state())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tenun server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
