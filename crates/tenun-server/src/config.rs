use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Server settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub catalog_seed: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub speech_model: String,
    pub upstream_timeout: Duration,
    pub ocr_binary: String,
    pub ocr_language: String,
    pub model_url: Option<String>,
    pub model_name: String,
    pub model_metadata: PathBuf,
    pub cors_origin: String,
    pub strict_status: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = var_or("TENUN_PORT", "8000")
            .parse()
            .context("TENUN_PORT must be a port number")?;
        let timeout_secs: u64 = var_or("TENUN_UPSTREAM_TIMEOUT_SECS", "60")
            .parse()
            .context("TENUN_UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")?;
        let strict_status = match var_or("TENUN_STRICT_STATUS", "false").to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => anyhow::bail!("TENUN_STRICT_STATUS must be true or false, got '{}'", other),
        };

        Ok(Self {
            host: var_or("TENUN_HOST", "0.0.0.0"),
            port,
            db_path: var_or("TENUN_DB_PATH", "tenun.db").into(),
            catalog_seed: var_opt("TENUN_CATALOG_SEED").map(PathBuf::from),
            openai_api_key: var_opt("OPENAI_API_KEY"),
            openai_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            chat_model: var_or("TENUN_CHAT_MODEL", "gpt-4"),
            speech_model: var_or("TENUN_SPEECH_MODEL", "tts-1"),
            upstream_timeout: Duration::from_secs(timeout_secs),
            ocr_binary: var_or("TENUN_OCR_BINARY", "tesseract"),
            ocr_language: var_or("TENUN_OCR_LANG", "ind"),
            model_url: var_opt("TENUN_MODEL_URL"),
            model_name: var_or("TENUN_MODEL_NAME", "tenun_classifier"),
            model_metadata: var_or("TENUN_MODEL_METADATA", "saved_models/model_metadata.json").into(),
            cors_origin: var_or("TENUN_CORS_ORIGIN", "http://localhost:3000"),
            strict_status,
        })
    }
}

/// Unset and blank both count as absent.
fn var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var_opt(key).unwrap_or_else(|| default.to_string())
}
