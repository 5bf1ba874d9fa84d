use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::UpstreamError;

/// Side length of the square input the model was trained on.
pub const IMAGE_SIZE: u32 = 224;

/// Normalized RGB tensor in, one probability per class out.
#[async_trait]
pub trait MotifModel: Send + Sync {
    /// Class names ordered by output index.
    fn class_names(&self) -> &[String];

    async fn predict(&self, input: Vec<f32>) -> Result<Vec<f32>, UpstreamError>;
}

/// Class index mapping shipped next to the trained model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelMetadata {
    pub classes: BTreeMap<String, usize>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            classes: BTreeMap::from([("ayam".to_string(), 0), ("manusia".to_string(), 1)]),
        }
    }
}

impl ModelMetadata {
    /// Reads the metadata file, falling back to the built-in mapping when it
    /// is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!(
                "Model metadata {} not found, using default class mapping",
                path.display()
            );
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading model metadata {}", path.display()))?;
        let metadata: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing model metadata {}", path.display()))?;
        info!("Model metadata loaded: {} classes", metadata.classes.len());
        Ok(metadata)
    }

    /// Class names indexed by model output position.
    pub fn class_names(&self) -> Vec<String> {
        let mut ordered: Vec<(usize, &String)> =
            self.classes.iter().map(|(name, idx)| (*idx, name)).collect();
        ordered.sort();
        ordered.into_iter().map(|(_, name)| name.clone()).collect()
    }
}

/// Resizes to the model resolution and scales channels into [0, 1],
/// row-major HWC order.
pub fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let resized = image
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Lanczos3)
        .to_rgb8();
    resized
        .into_raw()
        .into_iter()
        .map(|channel| channel as f32 / 255.0)
        .collect()
}

/// Model hosted behind a TensorFlow Serving REST endpoint.
pub struct TfServingModel {
    http: reqwest::Client,
    predict_url: String,
    class_names: Vec<String>,
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<[f32; 3]>>>,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

impl TfServingModel {
    pub fn new(
        base_url: &str,
        model_name: &str,
        metadata: &ModelMetadata,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            predict_url: format!(
                "{}/v1/models/{}:predict",
                base_url.trim_end_matches('/'),
                model_name
            ),
            class_names: metadata.class_names(),
        })
    }
}

#[async_trait]
impl MotifModel for TfServingModel {
    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    async fn predict(&self, input: Vec<f32>) -> Result<Vec<f32>, UpstreamError> {
        let side = IMAGE_SIZE as usize;
        if input.len() != side * side * 3 {
            return Err(UpstreamError::Malformed(format!(
                "expected {} input values, got {}",
                side * side * 3,
                input.len()
            )));
        }

        let rows: Vec<Vec<[f32; 3]>> = input
            .chunks_exact(side * 3)
            .map(|row| row.chunks_exact(3).map(|px| [px[0], px[1], px[2]]).collect())
            .collect();

        let response = self
            .http
            .post(&self.predict_url)
            .json(&PredictRequest {
                instances: vec![rows],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = response.json().await?;
        parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Malformed("prediction list was empty".into()))
    }
}
