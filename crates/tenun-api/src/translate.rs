use std::time::Instant;

use axum::{
    Json,
    extract::State,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;
use tracing::{info, warn};

use tenun_types::api::{
    LanguageInfo, OcrRequest, OcrResponse, OcrTranslateRequest, OcrTranslateResponse,
    SupportedLanguages, TranslateRequest, TranslateResponse,
};
use tenun_types::models::TargetLanguage;

use crate::error::{ApiError, ApiResult, Subsystem};
use crate::extract::{AppJson, AppMultipart};
use crate::ocr::prepare_for_ocr;
use crate::openai::Completion;
use crate::state::{AppState, db_call};

pub const SOURCE_LANGUAGE: &str = "sumba";
pub const MAX_TEXT_LEN: usize = 5000;
const MAX_CONTEXT_LEN: usize = 500;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const TRANSLATE_MAX_TOKENS: u32 = 1000;
const TRANSLATE_TEMPERATURE: f32 = 0.3;

/// Translation plus whatever metadata the model managed to structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTranslation {
    pub translated_text: String,
    pub cultural_notes: Option<String>,
    pub confidence_score: Option<f64>,
}

/// Reads the model's JSON answer, also when wrapped in a Markdown code
/// fence. Anything unparseable becomes the translation itself with no
/// metadata.
pub fn parse_translation(raw: &str) -> ParsedTranslation {
    let raw = raw.trim();
    let fallback = || ParsedTranslation {
        translated_text: raw.to_string(),
        cultural_notes: None,
        confidence_score: None,
    };

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(strip_code_fence(raw)) else {
        return fallback();
    };

    let translated_text = match fields.get("translated_text").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => return fallback(),
    };

    ParsedTranslation {
        translated_text,
        cultural_notes: fields
            .get("cultural_notes")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(String::from),
        confidence_score: fields
            .get("confidence_score")
            .and_then(Value::as_f64)
            .filter(|score| (0.0..=1.0).contains(score)),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(body) = raw.strip_prefix("```") else {
        return raw;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    // Drop the info string ("json") on the opening line.
    match body.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest.trim(),
        _ => body.trim(),
    }
}

fn system_prompt(target: TargetLanguage) -> String {
    format!(
        "Kamu adalah ahli bahasa dan budaya Sumba yang menerjemahkan teks bahasa Sumba ke {lang}.\n\n\
         Terjemahkan maknanya secara akurat dan alami, pertahankan nuansa budaya dan spiritual, \
         biarkan nama tempat, nama orang, dan istilah adat dalam bahasa aslinya dengan penjelasan \
         singkat, dan jelaskan ungkapan atau peribahasa bila tidak ada padanannya.\n\n\
         Jawab hanya dengan JSON berbentuk:\n\
         {{\"translated_text\": \"...\", \"cultural_notes\": \"... atau null\", \"confidence_score\": 0.0-1.0}}",
        lang = target.display_name(),
    )
}

fn user_prompt(text: &str, target: TargetLanguage, context: Option<&str>) -> String {
    let mut prompt = format!("Teks bahasa Sumba:\n\"{}\"\n", text);
    if let Some(context) = context {
        prompt.push_str(&format!("\nKonteks tambahan: {}\n", context));
    }
    prompt.push_str(&format!("\nTerjemahkan ke {}.", target.display_name()));
    prompt
}

fn parse_target(target: &str) -> ApiResult<TargetLanguage> {
    target.trim().parse().map_err(ApiError::BadRequest)
}

fn validate_text(text: &str) -> ApiResult<String> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::bad_request(format!(
            "Text must be between 1 and {} characters",
            MAX_TEXT_LEN
        )));
    }
    Ok(text.to_string())
}

fn validate_context(context: Option<String>) -> ApiResult<Option<String>> {
    let context = context
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(c) = &context {
        if c.chars().count() > MAX_CONTEXT_LEN {
            return Err(ApiError::bad_request(format!(
                "Context must be at most {} characters",
                MAX_CONTEXT_LEN
            )));
        }
    }
    Ok(context)
}

pub(crate) async fn require_user(state: &AppState, user_id: String) -> ApiResult<()> {
    if db_call(state, move |db| db.user_exists(&user_id)).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("User"))
    }
}

/// One completion call. Returns the parsed result and the seconds it took.
async fn translate(
    state: &AppState,
    text: &str,
    target: TargetLanguage,
    context: Option<&str>,
) -> ApiResult<(ParsedTranslation, f64)> {
    let generator = state.text_generator()?;
    let started = Instant::now();

    let system = system_prompt(target);
    let user = user_prompt(text, target, context);
    let raw = generator
        .complete(Completion {
            system: &system,
            user: &user,
            max_tokens: TRANSLATE_MAX_TOKENS,
            temperature: TRANSLATE_TEMPERATURE,
        })
        .await
        .map_err(|e| ApiError::upstream(Subsystem::Translation, e))?;

    let parsed = parse_translation(&raw);
    if parsed.translated_text == raw.trim() {
        warn!("Translation reply was not structured, using raw text");
    }
    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "Translated {} chars to {} in {:.2}s",
        text.chars().count(),
        target.code(),
        elapsed
    );
    Ok((parsed, elapsed))
}

/// Decodes a base64 payload, accepting an optional `data:` URL prefix.
pub(crate) fn decode_image_base64(encoded: &str) -> ApiResult<Vec<u8>> {
    let encoded = encoded.trim();
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    // Upper bound on decoded size, checked before allocating.
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 2 {
        return Err(image_too_large());
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| ApiError::bad_request("Invalid base64 image data"))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(image_too_large());
    }
    Ok(bytes)
}

fn image_too_large() -> ApiError {
    ApiError::bad_request(format!(
        "Image is too large, maximum is {} MB",
        MAX_IMAGE_BYTES / (1024 * 1024)
    ))
}

/// Text recognition on raw image bytes. Returns the text and seconds taken.
async fn extract_text(state: &AppState, bytes: Vec<u8>) -> ApiResult<(String, f64)> {
    let started = Instant::now();

    let png = tokio::task::spawn_blocking(move || -> ApiResult<Vec<u8>> {
        let image = image::load_from_memory(&bytes)
            .map_err(|_| ApiError::bad_request("Could not decode image"))?;
        prepare_for_ocr(&image).map_err(ApiError::Internal)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("image task failed: {}", e)))??;

    let text = state
        .ocr
        .recognize(png)
        .await
        .map_err(|e| ApiError::upstream(Subsystem::Ocr, e))?;
    if text.trim().is_empty() {
        return Err(ApiError::UnprocessableContent(
            "No text found in image".into(),
        ));
    }

    Ok((text.trim().to_string(), started.elapsed().as_secs_f64()))
}

pub async fn translate_text(
    State(state): State<AppState>,
    AppJson(req): AppJson<TranslateRequest>,
) -> ApiResult<Json<TranslateResponse>> {
    let target = parse_target(&req.target_language)?;
    let text = validate_text(&req.sumba_text)?;
    let context = validate_context(req.context)?;
    require_user(&state, req.user_id).await?;

    let (parsed, processing_time) = translate(&state, &text, target, context.as_deref()).await?;

    Ok(Json(TranslateResponse {
        original_text: text,
        translated_text: parsed.translated_text,
        source_language: SOURCE_LANGUAGE.into(),
        target_language: target.code().into(),
        confidence_score: parsed.confidence_score,
        cultural_notes: parsed.cultural_notes,
        processing_time,
    }))
}

pub async fn ocr(
    State(state): State<AppState>,
    AppJson(req): AppJson<OcrRequest>,
) -> ApiResult<Json<OcrResponse>> {
    let bytes = decode_image_base64(&req.image_base64)?;
    require_user(&state, req.user_id).await?;

    let (extracted_text, processing_time) = extract_text(&state, bytes).await?;
    Ok(Json(OcrResponse {
        extracted_text,
        processing_time,
    }))
}

pub async fn ocr_translate(
    State(state): State<AppState>,
    AppJson(req): AppJson<OcrTranslateRequest>,
) -> ApiResult<Json<OcrTranslateResponse>> {
    let target = parse_target(&req.target_language)?;
    let context = validate_context(req.context)?;
    let bytes = decode_image_base64(&req.image_base64)?;
    require_user(&state, req.user_id).await?;

    Ok(Json(ocr_then_translate(&state, bytes, target, context).await?))
}

pub async fn ocr_translate_upload(
    State(state): State<AppState>,
    AppMultipart(mut multipart): AppMultipart,
) -> ApiResult<Json<OcrTranslateResponse>> {
    let mut file = None;
    let mut user_id = None;
    let mut target = None;
    let mut context = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read upload: {}", e)))?;
                if bytes.len() > MAX_IMAGE_BYTES {
                    return Err(image_too_large());
                }
                file = Some(bytes.to_vec());
            }
            "user_id" | "target_language" | "context" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
                match name.as_str() {
                    "user_id" => user_id = Some(value),
                    "target_language" => target = Some(value),
                    _ => context = Some(value),
                }
            }
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| ApiError::bad_request("Missing file field"))?;
    let user_id = user_id.ok_or_else(|| ApiError::bad_request("Missing user_id field"))?;
    let target = parse_target(target.as_deref().unwrap_or("id"))?;
    let context = validate_context(context)?;
    require_user(&state, user_id).await?;

    Ok(Json(ocr_then_translate(&state, bytes, target, context).await?))
}

async fn ocr_then_translate(
    state: &AppState,
    bytes: Vec<u8>,
    target: TargetLanguage,
    context: Option<String>,
) -> ApiResult<OcrTranslateResponse> {
    let (extracted_text, ocr_time) = extract_text(state, bytes).await?;
    let text = validate_text(&extracted_text)?;
    let (parsed, translation_time) = translate(state, &text, target, context.as_deref()).await?;

    Ok(OcrTranslateResponse {
        extracted_text,
        translated_text: parsed.translated_text,
        source_language: SOURCE_LANGUAGE.into(),
        target_language: target.code().into(),
        confidence_score: parsed.confidence_score,
        cultural_notes: parsed.cultural_notes,
        ocr_time,
        translation_time,
        total_time: ocr_time + translation_time,
    })
}

pub async fn supported_languages() -> Json<SupportedLanguages> {
    Json(SupportedLanguages {
        supported_languages: TargetLanguage::ALL
            .iter()
            .map(|lang| LanguageInfo {
                code: lang.code().into(),
                name: lang.display_name().into(),
                description: format!("Translate from Sumba to {}", lang.display_name()),
            })
            .collect(),
        source_language: LanguageInfo {
            code: SOURCE_LANGUAGE.into(),
            name: "Bahasa Sumba".into(),
            description: "Source language of every translation".into(),
        },
        max_text_length: MAX_TEXT_LEN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_reply_is_parsed() {
        let parsed = parse_translation(
            r#"{"translated_text": "Selamat pagi", "cultural_notes": null, "confidence_score": 0.9}"#,
        );
        assert_eq!(parsed.translated_text, "Selamat pagi");
        assert_eq!(parsed.cultural_notes, None);
        assert_eq!(parsed.confidence_score, Some(0.9));
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let raw = "```json\n{\"translated_text\": \"Good morning\", \"cultural_notes\": \"A greeting\"}\n```";
        let parsed = parse_translation(raw);
        assert_eq!(parsed.translated_text, "Good morning");
        assert_eq!(parsed.cultural_notes.as_deref(), Some("A greeting"));
        assert_eq!(parsed.confidence_score, None);
    }

    #[test]
    fn unstructured_reply_falls_back_to_raw_text() {
        let parsed = parse_translation("  Selamat pagi, Ina.  ");
        assert_eq!(
            parsed,
            ParsedTranslation {
                translated_text: "Selamat pagi, Ina.".into(),
                cultural_notes: None,
                confidence_score: None,
            }
        );
        assert_eq!(parse_translation("[1, 2]").translated_text, "[1, 2]");
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let encoded = STANDARD.encode(b"png-bytes");
        assert_eq!(decode_image_base64(&encoded).unwrap(), b"png-bytes");
        let url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_image_base64(&url).unwrap(), b"png-bytes");
        assert!(decode_image_base64("not base64!").is_err());
    }

    #[test]
    fn user_prompt_includes_context_only_when_given() {
        let with = user_prompt("Mai", TargetLanguage::En, Some("greeting"));
        assert!(with.contains("Konteks tambahan: greeting"));
        assert!(with.ends_with("Terjemahkan ke English."));
        assert!(!user_prompt("Mai", TargetLanguage::Id, None).contains("Konteks"));
    }
}
