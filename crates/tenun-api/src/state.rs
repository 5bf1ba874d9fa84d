use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::error;

use tenun_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::ocr::{TesseractCli, TextRecognizer};
use crate::openai::{SpeechSynthesizer, TextGenerator};
use crate::vision::MotifModel;

pub type AppState = Arc<AppStateInner>;

/// Process-wide handles, built once at startup and read-only afterwards.
pub struct AppStateInner {
    pub db: Database,
    pub text: Option<Arc<dyn TextGenerator>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub ocr: Arc<dyn TextRecognizer>,
    pub classifier: Option<Arc<dyn MotifModel>>,
    /// Enforce the order-status transition table on manual overrides.
    pub strict_status: bool,
    /// Verified against when a login names an unknown email.
    pub(crate) dummy_hash: String,
}

impl AppStateInner {
    pub fn new(db: Database) -> anyhow::Result<Self> {
        Ok(Self {
            db,
            text: None,
            speech: None,
            ocr: Arc::new(TesseractCli::new("tesseract", "ind", Duration::from_secs(60))),
            classifier: None,
            strict_status: false,
            dummy_hash: crate::auth::hash_password_blocking("tenun-dummy-password")?,
        })
    }

    pub fn with_text_generator(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn TextRecognizer>) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn MotifModel>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_strict_status(mut self, strict: bool) -> Self {
        self.strict_status = strict;
        self
    }

    pub fn into_state(self) -> AppState {
        Arc::new(self)
    }

    pub(crate) fn text_generator(&self) -> ApiResult<Arc<dyn TextGenerator>> {
        self.text.clone().ok_or_else(|| {
            ApiError::ServiceUnavailable("Text generation service is not configured".into())
        })
    }

    pub(crate) fn speech_synthesizer(&self) -> ApiResult<Arc<dyn SpeechSynthesizer>> {
        self.speech.clone().ok_or_else(|| {
            ApiError::ServiceUnavailable("Speech service is not configured".into())
        })
    }
}

/// Runs a blocking database call off the async runtime.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {}", e))
        })?
        .map_err(ApiError::Internal)
}
