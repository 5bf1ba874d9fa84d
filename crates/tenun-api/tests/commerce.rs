mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::{app, base_state, empty_request, json_request, register, seed_catalog, send};

async fn buy(app: &axum::Router, user_id: &str, product_id: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/buy",
            json!({
                "user_id": user_id,
                "product_id": product_id,
                "address": "Jl. Ahmad Yani 12, Waingapu",
                "phone_number": "081234567890",
            }),
        ),
    )
    .await
}

#[tokio::test]
async fn buy_confirm_then_second_confirm_fails() {
    let state = base_state().into_state();
    seed_catalog(&state, &[("P001", 1, 100_000)]);
    let app = app(state.clone());
    let user_id = register(&app, "rambu@example.com").await;

    let (status, order) = buy(&app, &user_id, "P001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "pending_payment");
    assert_eq!(order["total_price"], 110_000);
    assert!(order["resi"].is_null());
    assert_eq!(state.db.get_product("P001").unwrap().unwrap().quantity, 1);

    let id = order["transaction_id"].as_str().unwrap();

    let (status, qris) = send(&app, empty_request("POST", &format!("/payment/{}/qris", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(qris["qris_code"].as_str().unwrap().starts_with(&format!("QRIS-{}-", id)));
    assert_eq!(qris["total_amount"], 110_000);

    let (status, confirmed) = send(&app, empty_request("POST", &format!("/payment/{}/confirm", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "paid");
    assert!(confirmed["resi"].as_str().unwrap().starts_with("RESI-"));
    assert_eq!(state.db.get_product("P001").unwrap().unwrap().quantity, 0);

    let (status, _) = send(&app, empty_request("POST", &format!("/payment/{}/confirm", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.db.get_product("P001").unwrap().unwrap().quantity, 0);

    let (status, _) = send(&app, empty_request("POST", &format!("/payment/{}/qris", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sold_out_products_are_hidden_and_unbuyable() {
    let state = base_state().into_state();
    seed_catalog(&state, &[("P001", 0, 50_000), ("P002", 3, 75_000)]);
    let app = app(state);
    let user_id = register(&app, "rambu@example.com").await;

    let (status, products) = send(&app, empty_request("GET", "/products")).await;
    assert_eq!(status, StatusCode::OK);
    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["product_id"], "P002");
    assert!(products.iter().all(|p| p["quantity"].as_i64().unwrap() > 0));

    let (status, body) = buy(&app, &user_id, "P001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Product out of stock");

    let (status, _) = buy(&app, &user_id, "P404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = buy(&app, "NOBODY01", "P002").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_confirmations_on_last_unit() {
    let state = base_state().into_state();
    seed_catalog(&state, &[("P001", 1, 100_000)]);
    let app = app(state.clone());
    let user_id = register(&app, "rambu@example.com").await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        let (_, order) = buy(&app, &user_id, "P001").await;
        ids.push(order["transaction_id"].as_str().unwrap().to_string());
    }

    let tasks: Vec<_> = ids
        .iter()
        .map(|id| {
            let app = app.clone();
            let uri = format!("/payment/{}/confirm", id);
            tokio::spawn(async move { send(&app, empty_request("POST", &uri)).await.0 })
        })
        .collect();

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 5);
    assert_eq!(state.db.get_product("P001").unwrap().unwrap().quantity, 0);
}

#[tokio::test]
async fn product_detail_embeds_weaver() {
    let state = base_state().into_state();
    seed_catalog(&state, &[("P001", 2, 100_000)]);
    let app = app(state);

    let (status, product) = send(&app, empty_request("GET", "/products/P001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["product_id"], "P001");
    assert_eq!(product["weaver_id"], "W001");
    assert_eq!(product["weaver"]["name"], "Mama Tamu");
    assert_eq!(product["weaver"]["specialization"], json!(["hinggi", "pewarna alami"]));

    let (status, _) = send(&app, empty_request("GET", "/products/P404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tracking_and_history_projections() {
    let state = base_state().into_state();
    seed_catalog(&state, &[("P001", 2, 100_000)]);
    let app = app(state);
    let user_id = register(&app, "rambu@example.com").await;
    let (_, order) = buy(&app, &user_id, "P001").await;
    let id = order["transaction_id"].as_str().unwrap();

    let (status, details) = send(&app, empty_request("GET", &format!("/payment/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["product_price"], 100_000);
    assert_eq!(details["shipping_cost"], 10_000);

    let (status, tracking) = send(&app, empty_request("GET", &format!("/track/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracking["status"], "pending_payment");

    let (status, history) =
        send(&app, empty_request("GET", &format!("/transactions/user/{}", user_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, empty_request("GET", "/track/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn free_form_status_override_is_accepted_by_default() {
    let state = base_state().into_state();
    seed_catalog(&state, &[("P001", 2, 100_000)]);
    let app = app(state);
    let user_id = register(&app, "rambu@example.com").await;
    let (_, order) = buy(&app, &user_id, "P001").await;
    let id = order["transaction_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        empty_request(
            "PUT",
            &format!("/orders/{}/status?new_status=dikemas&resi=RESI-MANUAL01", id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "dikemas");
    assert_eq!(body["resi"], "RESI-MANUAL01");

    let (status, _) = send(
        &app,
        empty_request("PUT", "/orders/missing/status?new_status=shipped"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strict_mode_enforces_the_transition_table() {
    let state = base_state().with_strict_status(true).into_state();
    seed_catalog(&state, &[("P001", 2, 100_000)]);
    let app = app(state);
    let user_id = register(&app, "rambu@example.com").await;
    let (_, order) = buy(&app, &user_id, "P001").await;
    let id = order["transaction_id"].as_str().unwrap();
    let update = |status: &str| empty_request("PUT", &format!("/orders/{}/status?new_status={}", id, status));

    let (status, _) = send(&app, update("dikemas")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, update("paid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, update("shipped")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&app, empty_request("POST", &format!("/payment/{}/confirm", id))).await;
    let (status, body) = send(&app, update("shipped")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");
    let (status, _) = send(&app, update("delivered")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, update("cancelled")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
