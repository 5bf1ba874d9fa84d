#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tenun_api::error::UpstreamError;
use tenun_api::ocr::TextRecognizer;
use tenun_api::openai::{Completion, SpeechSynthesizer, TextGenerator};
use tenun_api::vision::MotifModel;
use tenun_api::{AppState, AppStateInner, build_router};
use tenun_db::Database;
use tenun_db::seed::{CatalogSeed, ProductSeed, WeaverSeed};
use tenun_types::models::Voice;

/// Text generator that answers every prompt with the same reply.
pub struct FakeText {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeText {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn complete(&self, request: Completion<'_>) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.user.to_string());
        self.reply.clone().ok_or(UpstreamError::Status {
            status: 500,
            body: "model overloaded".into(),
        })
    }
}

pub struct FakeSpeech;

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, _text: &str, _voice: Voice) -> Result<Bytes, UpstreamError> {
        Ok(Bytes::from_static(b"ID3-fake-mp3"))
    }
}

pub struct FakeOcr(pub &'static str);

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn recognize(&self, png: Vec<u8>) -> Result<String, UpstreamError> {
        assert_eq!(&png[1..4], b"PNG");
        Ok(self.0.to_string())
    }
}

pub struct FakeModel {
    names: Vec<String>,
    scores: Vec<f32>,
}

impl FakeModel {
    pub fn scoring(scores: &[f32]) -> Self {
        Self {
            names: vec!["ayam".into(), "manusia".into()],
            scores: scores.to_vec(),
        }
    }
}

#[async_trait]
impl MotifModel for FakeModel {
    fn class_names(&self) -> &[String] {
        &self.names
    }

    async fn predict(&self, input: Vec<f32>) -> Result<Vec<f32>, UpstreamError> {
        assert_eq!(input.len(), 224 * 224 * 3);
        Ok(self.scores.clone())
    }
}

pub fn base_state() -> AppStateInner {
    AppStateInner::new(Database::open_in_memory().unwrap()).unwrap()
}

pub fn seed_catalog(state: &AppState, products: &[(&str, i64, i64)]) {
    let seed = CatalogSeed {
        weavers: vec![WeaverSeed {
            weaver_id: "W001".into(),
            name: "Mama Tamu".into(),
            bio: Some("Penenun hinggi dari Prailiu".into()),
            address: Some("Waingapu".into()),
            phone_number: None,
            specialization: vec!["hinggi".into(), "pewarna alami".into()],
        }],
        products: products
            .iter()
            .map(|(id, quantity, price)| ProductSeed {
                product_id: id.to_string(),
                name: format!("Kain {}", id),
                quantity: *quantity,
                price: *price,
                category: "kain".into(),
                description: None,
                meaning_motif: None,
                long_description: None,
                long_meaning_motif: None,
                video_url: None,
                photo_url: None,
                weaver_id: "W001".into(),
            })
            .collect(),
    };
    state.db.seed_catalog(&seed).unwrap();
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub const BOUNDARY: &str = "tenun-test-boundary";

/// `(name, filename+content type, bytes)` parts.
pub fn multipart_request(uri: &str, parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    name, filename, content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        32,
        24,
        image::Rgb([180, 40, 20]),
    ));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, String, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, bytes)
}

/// Registers an account and returns its user id.
pub async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/auth/register",
            serde_json::json!({ "name": "Rambu Ana", "email": email, "password": "tenun123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["user_id"].as_str().unwrap().to_string()
}

pub fn app(state: AppState) -> Router {
    build_router(state)
}
