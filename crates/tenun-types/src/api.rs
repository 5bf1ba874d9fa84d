use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::motifs::MotifAnalysis;

// -- Auth / profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public profile. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNameRequest {
    pub user_id: String,
    pub new_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    pub user_id: String,
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub user_message: String,
    pub user_id: String,
    /// Client-chosen idempotency key for this turn.
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub bot_response: String,
    pub conversation_id: i64,
    pub character_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatWithTtsResponse {
    pub bot_response: String,
    pub conversation_id: i64,
    pub character_name: String,
    pub audio_base64: String,
    pub voice_used: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_language() -> String {
    "id".to_string()
}

#[derive(Debug, Deserialize)]
pub struct VoiceQuery {
    #[serde(default = "default_chat_voice")]
    pub voice: String,
}

fn default_chat_voice() -> String {
    "nova".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CharacterResponse {
    pub character_id: String,
    pub name: String,
    pub bio: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub message_id: i64,
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub conversation_id: i64,
    pub user_id: String,
    pub character_name: String,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    pub character_id: String,
    pub character_name: String,
    pub last_message: Option<String>,
    pub last_timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserConversations {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationRef {
    pub conversation_id: i64,
    pub user_id: String,
    pub character_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CharacterConversation {
    pub conversation: Option<ConversationRef>,
    pub messages: Vec<MessageView>,
}

// -- Translation / OCR --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslateRequest {
    pub sumba_text: String,
    pub target_language: String,
    pub user_id: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub confidence_score: Option<f64>,
    pub cultural_notes: Option<String>,
    pub processing_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcrRequest {
    pub user_id: String,
    pub image_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OcrResponse {
    pub extracted_text: String,
    pub processing_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcrTranslateRequest {
    pub user_id: String,
    pub image_base64: String,
    pub target_language: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OcrTranslateResponse {
    pub extracted_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub confidence_score: Option<f64>,
    pub cultural_notes: Option<String>,
    pub ocr_time: f64,
    pub translation_time: f64,
    pub total_time: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupportedLanguages {
    pub supported_languages: Vec<LanguageInfo>,
    pub source_language: LanguageInfo,
    pub max_text_length: usize,
}

// -- Classification --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub file_size_bytes: usize,
    pub file_size_mb: f64,
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub prediction: String,
    pub confidence: f64,
    pub is_uncertain: bool,
    pub processing_time: f64,
    pub motif_analysis: Option<&'static MotifAnalysis>,
    pub probabilities: BTreeMap<String, f64>,
    pub recommendation: Option<String>,
    pub raw_prediction: String,
    pub threshold_used: f64,
    pub image_info: ImageInfo,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub supported_classes: Vec<String>,
    pub confidence_threshold: f64,
    pub image_size: String,
    pub supported_formats: Vec<String>,
    pub max_file_size_mb: usize,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct MotifEncyclopedia {
    pub title: String,
    pub motifs: BTreeMap<&'static str, &'static MotifAnalysis>,
    pub total_motifs: usize,
}

// -- Commerce --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaverResponse {
    pub weaver_id: String,
    pub name: String,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub specialization: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub price: i64,
    pub category: String,
    pub description: Option<String>,
    pub meaning_motif: Option<String>,
    pub long_description: Option<String>,
    pub long_meaning_motif: Option<String>,
    pub video_url: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductWithWeaverResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub weaver_id: String,
    pub weaver: Option<WeaverResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuyRequest {
    pub user_id: String,
    pub product_id: String,
    pub address: String,
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub user_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub address: String,
    pub phone_number: String,
    pub resi: Option<String>,
    pub total_price: i64,
    pub status: String,
    pub transaction_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub transaction_id: String,
    pub product_name: String,
    pub product_price: i64,
    pub shipping_cost: i64,
    pub total_price: i64,
    pub address: String,
    pub phone_number: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentCodeResponse {
    pub transaction_id: String,
    pub qris_code: String,
    pub total_amount: i64,
    pub product_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmPaymentResponse {
    pub message: String,
    pub transaction_id: String,
    pub resi: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub transaction_id: String,
    pub product_name: String,
    pub resi: Option<String>,
    pub status: String,
    pub address: String,
    pub phone_number: String,
    pub total_price: i64,
    pub transaction_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateQuery {
    pub new_status: String,
    pub resi: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub message: String,
    pub transaction_id: String,
    pub status: String,
    pub resi: Option<String>,
}

// -- Operational --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub text_generation_configured: bool,
    pub classifier_loaded: bool,
    pub timestamp: String,
}
