pub mod auth;
pub mod chat;
pub mod classify;
pub mod commerce;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod openai;
pub mod profile;
pub mod state;
pub mod translate;
pub mod vision;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post, put},
};
use serde_json::{Value, json};

use tenun_types::api::HealthResponse;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, AppStateInner};

/// Uploads are capped at 10 MB by the handlers; this leaves room for
/// multipart framing and base64 inflation.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// All routes, without CORS or tracing layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        // Auth / profile
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/profile/{user_id}", get(profile::get_profile))
        .route("/profile/update-name", put(profile::update_name))
        .route("/profile/update-password", put(profile::update_password))
        // Chat
        .route("/character", get(chat::get_character))
        .route("/chat", post(chat::send_message))
        .route("/chat-with-tts", post(chat::chat_with_tts))
        .route("/tts", post(chat::text_to_speech))
        .route("/tts/voices", get(chat::list_voices))
        .route(
            "/conversation/{conversation_id}",
            get(chat::get_conversation).delete(chat::delete_conversation),
        )
        .route("/user/{user_id}/conversations", get(chat::list_user_conversations))
        .route(
            "/user/{user_id}/conversations/{character_id}",
            get(chat::get_character_conversation),
        )
        // Translation / OCR
        .route("/translate", post(translate::translate_text))
        .route("/ocr", post(translate::ocr))
        .route("/ocr-translate", post(translate::ocr_translate))
        .route("/ocr-translate-upload", post(translate::ocr_translate_upload))
        .route("/supported-languages", get(translate::supported_languages))
        // Classification
        .route("/classify-tenun", post(classify::classify))
        .route("/model-info", get(classify::model_info))
        .route("/motif-encyclopedia", get(classify::motif_encyclopedia))
        // Commerce
        .route("/products", get(commerce::list_products))
        .route("/products/{product_id}", get(commerce::get_product))
        .route("/buy", post(commerce::buy))
        .route("/payment/{transaction_id}", get(commerce::payment_details))
        .route("/payment/{transaction_id}/qris", post(commerce::generate_payment_code))
        .route("/payment/{transaction_id}/confirm", post(commerce::confirm_payment))
        .route("/track/{transaction_id}", get(commerce::track_order))
        .route("/transactions/user/{user_id}", get(commerce::list_user_transactions))
        .route("/orders/{transaction_id}/status", put(commerce::update_status))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

async fn banner() -> Json<Value> {
    Json(json!({
        "message": "Tenun Sumba API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        text_generation_configured: state.text.is_some(),
        classifier_loaded: state.classifier.is_some(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
