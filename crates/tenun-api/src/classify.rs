use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    Json,
    extract::State,
};
use tracing::info;

use tenun_types::api::{ClassificationResponse, ImageInfo, ModelInfo, MotifEncyclopedia};
use tenun_types::motifs::{self, MotifAnalysis};

use crate::error::{ApiError, ApiResult, Subsystem, UpstreamError};
use crate::extract::AppMultipart;
use crate::state::AppState;
use crate::translate::{MAX_IMAGE_BYTES, require_user};
use crate::vision::{IMAGE_SIZE, ModelMetadata, preprocess};

/// Top-class confidence, in percent, below which a prediction is reported as uncertain.
pub const CONFIDENCE_THRESHOLD: f64 = 75.0;
pub const UNCERTAIN: &str = "uncertain";
const MODEL_NAME: &str = "Tenun Sumba Motif Classifier";
const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/bmp"];
const MAX_NOTES_LEN: usize = 200;

/// Thresholded reading of one probability vector.
#[derive(Debug)]
pub struct Interpretation {
    pub prediction: String,
    pub raw_prediction: String,
    pub confidence: f64,
    pub is_uncertain: bool,
    pub probabilities: BTreeMap<String, f64>,
    pub motif_analysis: Option<&'static MotifAnalysis>,
    pub recommendation: Option<String>,
}

/// Picks the top class and applies the confidence cutoff. Probabilities come
/// back as percentages.
pub fn interpret(class_names: &[String], scores: &[f32]) -> Result<Interpretation, UpstreamError> {
    if scores.len() != class_names.len() || scores.is_empty() {
        return Err(UpstreamError::Malformed(format!(
            "model returned {} scores for {} classes",
            scores.len(),
            class_names.len()
        )));
    }

    let (top, top_score) = scores
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, s)| if s > best.1 { (i, s) } else { best });
    let raw_prediction = class_names[top].clone();
    let confidence = round2(f64::from(top_score) * 100.0);
    let is_uncertain = confidence < CONFIDENCE_THRESHOLD;

    let probabilities = class_names
        .iter()
        .zip(scores)
        .map(|(name, score)| (name.clone(), round2(f64::from(*score) * 100.0)))
        .collect();

    let (prediction, motif_analysis, recommendation) = if is_uncertain {
        (
            UNCERTAIN.to_string(),
            None,
            Some(format!(
                "The model is not confident in this prediction ({:.1}%). Try a sharper, well-lit \
                 photo that focuses on the woven motif.",
                confidence
            )),
        )
    } else {
        let analysis = motifs::lookup(&raw_prediction);
        let recommendation = analysis.map(|_| {
            format!(
                "The image shows the {} motif with {:.1}% confidence. This motif carries deep \
                 cultural meaning in Sumba weaving tradition.",
                raw_prediction, confidence
            )
        });
        (raw_prediction.clone(), analysis, recommendation)
    };

    Ok(Interpretation {
        prediction,
        raw_prediction,
        confidence,
        is_uncertain,
        probabilities,
        motif_analysis,
        recommendation,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub async fn classify(
    State(state): State<AppState>,
    AppMultipart(mut multipart): AppMultipart,
) -> ApiResult<Json<ClassificationResponse>> {
    let model = state.classifier.clone().ok_or_else(|| {
        ApiError::ServiceUnavailable("Classification model is not loaded".into())
    })?;
    let started = Instant::now();

    let mut file = None;
    let mut user_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
                if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
                    return Err(ApiError::bad_request(format!(
                        "Unsupported file type '{}', expected JPEG, PNG or BMP",
                        content_type
                    )));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read upload: {}", e)))?;
                if bytes.len() > MAX_IMAGE_BYTES {
                    return Err(ApiError::bad_request("Image is too large, maximum is 10 MB"));
                }
                file = Some(bytes);
            }
            "user_id" => {
                user_id = Some(field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Invalid form field: {}", e))
                })?);
            }
            "image_quality_notes" => {
                let notes = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Invalid form field: {}", e))
                })?;
                if notes.chars().count() > MAX_NOTES_LEN {
                    return Err(ApiError::bad_request(format!(
                        "Image quality notes must be at most {} characters",
                        MAX_NOTES_LEN
                    )));
                }
            }
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| ApiError::bad_request("Missing file field"))?;
    let user_id = user_id.ok_or_else(|| ApiError::bad_request("Missing user_id field"))?;
    require_user(&state, user_id.clone()).await?;

    let (tensor, image_info) = tokio::task::spawn_blocking(move || -> ApiResult<_> {
        let format = image::guess_format(&bytes)
            .ok()
            .map(|f| format!("{:?}", f).to_uppercase());
        let image = image::load_from_memory(&bytes)
            .map_err(|_| ApiError::bad_request("Could not decode image"))?;
        let info = ImageInfo {
            format,
            width: image.width(),
            height: image.height(),
            file_size_bytes: bytes.len(),
            file_size_mb: round2(bytes.len() as f64 / (1024.0 * 1024.0)),
        };
        Ok((preprocess(&image), info))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("image task failed: {}", e)))??;

    let scores = model
        .predict(tensor)
        .await
        .map_err(|e| ApiError::upstream(Subsystem::Classification, e))?;
    let result = interpret(model.class_names(), &scores)
        .map_err(|e| ApiError::upstream(Subsystem::Classification, e))?;

    info!(
        "Classified upload from {} as {} ({:.1}%)",
        user_id, result.prediction, result.confidence
    );

    Ok(Json(ClassificationResponse {
        prediction: result.prediction,
        confidence: result.confidence,
        is_uncertain: result.is_uncertain,
        processing_time: started.elapsed().as_secs_f64(),
        motif_analysis: result.motif_analysis,
        probabilities: result.probabilities,
        recommendation: result.recommendation,
        raw_prediction: result.raw_prediction,
        threshold_used: CONFIDENCE_THRESHOLD,
        image_info,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    let supported_classes = match &state.classifier {
        Some(model) => model.class_names().to_vec(),
        None => ModelMetadata::default().class_names(),
    };

    Json(ModelInfo {
        model_name: MODEL_NAME.into(),
        supported_classes,
        confidence_threshold: CONFIDENCE_THRESHOLD,
        image_size: format!("{}x{}", IMAGE_SIZE, IMAGE_SIZE),
        supported_formats: vec!["JPEG".into(), "PNG".into(), "BMP".into()],
        max_file_size_mb: MAX_IMAGE_BYTES / (1024 * 1024),
        model_loaded: state.classifier.is_some(),
    })
}

pub async fn motif_encyclopedia() -> Json<MotifEncyclopedia> {
    let motifs: BTreeMap<_, _> = motifs::all().into_iter().collect();
    Json(MotifEncyclopedia {
        title: "Sumba Weaving Motif Encyclopedia".into(),
        total_motifs: motifs.len(),
        motifs,
    })
}
