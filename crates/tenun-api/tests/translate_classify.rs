mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;

use common::{
    FakeModel, FakeOcr, FakeText, app, base_state, empty_request, json_request, multipart_request,
    png_bytes, register, send,
};

#[tokio::test]
async fn structured_translation_is_returned_with_metadata() {
    let reply = r#"{"translated_text": "Selamat pagi, Ibu", "cultural_notes": "Sapaan hormat", "confidence_score": 0.85}"#;
    let text = Arc::new(FakeText::replying(reply));
    let app = app(base_state().with_text_generator(text.clone()).into_state());
    let user_id = register(&app, "rambu@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/translate",
            json!({ "sumba_text": "Mai ina", "target_language": "id", "user_id": user_id, "context": "sapaan" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translated_text"], "Selamat pagi, Ibu");
    assert_eq!(body["cultural_notes"], "Sapaan hormat");
    assert_eq!(body["confidence_score"], 0.85);
    assert_eq!(body["source_language"], "sumba");
    assert!(text.last_prompt().contains("Konteks tambahan: sapaan"));
}

#[tokio::test]
async fn unstructured_translation_degrades_to_raw_text() {
    let app = app(
        base_state()
            .with_text_generator(Arc::new(FakeText::replying("Good morning, mother")))
            .into_state(),
    );
    let user_id = register(&app, "rambu@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/translate",
            json!({ "sumba_text": "Mai ina", "target_language": "en", "user_id": user_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translated_text"], "Good morning, mother");
    assert!(body["cultural_notes"].is_null());
    assert!(body["confidence_score"].is_null());
}

#[tokio::test]
async fn translation_validates_language_and_user() {
    let app = app(base_state().with_text_generator(Arc::new(FakeText::replying("x"))).into_state());
    let user_id = register(&app, "rambu@example.com").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/translate",
            json!({ "sumba_text": "Mai", "target_language": "fr", "user_id": user_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/translate",
            json!({ "sumba_text": "Mai", "target_language": "id", "user_id": "NOBODY01" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/translate",
            json!({ "sumba_text": "a".repeat(5001), "target_language": "id", "user_id": user_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ocr_then_translate_reports_all_timings() {
    let app = app(
        base_state()
            .with_text_generator(Arc::new(FakeText::replying("Rumah adat")))
            .with_ocr(Arc::new(FakeOcr("Uma mbatangu")))
            .into_state(),
    );
    let user_id = register(&app, "rambu@example.com").await;
    let image = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/ocr-translate",
            json!({ "user_id": user_id, "image_base64": image, "target_language": "id" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extracted_text"], "Uma mbatangu");
    assert_eq!(body["translated_text"], "Rumah adat");
    let total = body["total_time"].as_f64().unwrap();
    let parts = body["ocr_time"].as_f64().unwrap() + body["translation_time"].as_f64().unwrap();
    assert!((total - parts).abs() < 1e-9);
}

#[tokio::test]
async fn ocr_upload_accepts_multipart() {
    let app = app(
        base_state()
            .with_text_generator(Arc::new(FakeText::replying("Rumah adat")))
            .with_ocr(Arc::new(FakeOcr("Uma mbatangu")))
            .into_state(),
    );
    let user_id = register(&app, "rambu@example.com").await;
    let png = png_bytes();

    let (status, body) = send(
        &app,
        multipart_request(
            "/ocr-translate-upload",
            &[
                ("file", Some(("scan.png", "image/png")), png.as_slice()),
                ("user_id", None, user_id.as_bytes()),
                ("target_language", None, b"en".as_slice()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["target_language"], "en");
}

#[tokio::test]
async fn blank_image_text_is_unprocessable() {
    let app = app(
        base_state()
            .with_text_generator(Arc::new(FakeText::replying("x")))
            .with_ocr(Arc::new(FakeOcr("  \n")))
            .into_state(),
    );
    let user_id = register(&app, "rambu@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/ocr",
            json!({ "user_id": user_id, "image_base64": STANDARD.encode(png_bytes()) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "No text found in image");

    let (status, _) = send(
        &app,
        json_request("POST", "/ocr", json!({ "user_id": user_id, "image_base64": "@@@" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn classify(app: &axum::Router, user_id: &str, content_type: &str) -> (StatusCode, serde_json::Value) {
    let png = png_bytes();
    send(
        app,
        multipart_request(
            "/classify-tenun",
            &[
                ("file", Some(("kain.png", content_type)), png.as_slice()),
                ("user_id", None, user_id.as_bytes()),
                ("image_quality_notes", None, b"cahaya siang".as_slice()),
            ],
        ),
    )
    .await
}

#[tokio::test]
async fn confident_classification_includes_motif_analysis() {
    let app = app(base_state().with_classifier(Arc::new(FakeModel::scoring(&[0.92, 0.08]))).into_state());
    let user_id = register(&app, "rambu@example.com").await;

    let (status, body) = classify(&app, &user_id, "image/png").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["prediction"], "ayam");
    assert_eq!(body["is_uncertain"], false);
    assert_eq!(body["threshold_used"], 75.0);
    assert!(body["motif_analysis"]["title"].is_string());
    assert_eq!(body["image_info"]["width"], 32);
    assert_eq!(body["image_info"]["format"], "PNG");
    assert_eq!(body["probabilities"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn low_confidence_classification_is_uncertain_not_an_error() {
    let app = app(base_state().with_classifier(Arc::new(FakeModel::scoring(&[0.55, 0.45]))).into_state());
    let user_id = register(&app, "rambu@example.com").await;

    let (status, body) = classify(&app, &user_id, "image/png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], "uncertain");
    assert_eq!(body["raw_prediction"], "ayam");
    assert_eq!(body["is_uncertain"], true);
    assert!(body["motif_analysis"].is_null());
    assert!(body["recommendation"].is_string());
}

#[tokio::test]
async fn classification_checks_model_type_and_user() {
    let unloaded = app(base_state().into_state());
    let user_id = register(&unloaded, "rambu@example.com").await;
    let (status, _) = classify(&unloaded, &user_id, "image/png").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let app = app(base_state().with_classifier(Arc::new(FakeModel::scoring(&[0.9, 0.1]))).into_state());
    let user_id = register(&app, "rambu@example.com").await;
    let (status, _) = classify(&app, &user_id, "image/gif").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = classify(&app, "NOBODY01", "image/png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reference_endpoints() {
    let app = app(base_state().into_state());

    let (status, info) = send(&app, empty_request("GET", "/model-info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["model_loaded"], false);
    assert_eq!(info["supported_classes"], json!(["ayam", "manusia"]));

    let (_, encyclopedia) = send(&app, empty_request("GET", "/motif-encyclopedia")).await;
    assert_eq!(encyclopedia["total_motifs"], 2);

    let (_, languages) = send(&app, empty_request("GET", "/supported-languages")).await;
    assert_eq!(languages["supported_languages"].as_array().unwrap().len(), 2);
    assert_eq!(languages["max_text_length"], 5000);

    let (_, health) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["text_generation_configured"], false);
}
