use std::io::Cursor;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::UpstreamError;

/// Image in, recognized text out.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, png: Vec<u8>) -> Result<String, UpstreamError>;
}

/// Runs the `tesseract` command-line engine, feeding the image on stdin.
pub struct TesseractCli {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, png: Vec<u8>) -> Result<String, UpstreamError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    UpstreamError::Unavailable(format!("OCR engine '{}' not found", self.binary))
                }
                _ => UpstreamError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(UpstreamError::Malformed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("OCR recognized {} chars", text.len());
        Ok(text)
    }
}

/// Grayscale PNG re-encoding of a decoded upload, the form handed to the engine.
pub fn prepare_for_ocr(image: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .grayscale()
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
