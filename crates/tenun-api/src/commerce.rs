use axum::{
    Json,
    extract::State,
};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use tenun_db::commerce::{ConfirmOutcome, StatusOutcome};
use tenun_db::models::{NewTransaction, ProductRow, TransactionRow, WeaverRow};
use tenun_types::api::{
    BuyRequest, ConfirmPaymentResponse, PaymentCodeResponse, PaymentDetails, ProductResponse,
    ProductWithWeaverResponse, StatusUpdateQuery, StatusUpdateResponse, TrackingResponse,
    TransactionResponse, WeaverResponse,
};
use tenun_types::models::{OrderStatus, SHIPPING_FEE};

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::state::{AppState, db_call};

const ORDER_QUANTITY: i64 = 1;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn payment_code(transaction_id: &str) -> String {
    format!("QRIS-{}-{}", transaction_id, random_code(12))
}

pub fn tracking_code() -> String {
    format!("RESI-{}", random_code(10))
}

// -- Catalog --

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductResponse>>> {
    let products = db_call(&state, |db| db.list_available_products()).await?;
    Ok(Json(products.into_iter().map(product_response).collect()))
}

pub async fn get_product(
    State(state): State<AppState>,
    AppPath(product_id): AppPath<String>,
) -> ApiResult<Json<ProductWithWeaverResponse>> {
    let (product, weaver) = db_call(&state, move |db| {
        let Some(product) = db.get_product(&product_id)? else {
            return Ok(None);
        };
        let weaver = db.get_weaver(&product.weaver_id)?;
        Ok(Some((product, weaver)))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Product"))?;

    let weaver_id = product.weaver_id.clone();
    Ok(Json(ProductWithWeaverResponse {
        product: product_response(product),
        weaver_id,
        weaver: weaver.map(weaver_response),
    }))
}

// -- Orders --

pub async fn buy(
    State(state): State<AppState>,
    AppJson(req): AppJson<BuyRequest>,
) -> ApiResult<Json<TransactionResponse>> {
    let address = req.address.trim().to_string();
    let phone_number = req.phone_number.trim().to_string();
    if address.is_empty() {
        return Err(ApiError::bad_request("Address is required"));
    }
    if phone_number.is_empty() {
        return Err(ApiError::bad_request("Phone number is required"));
    }

    let row = db_call(&state, move |db| {
        if !db.user_exists(&req.user_id)? {
            return Ok(Err(ApiError::not_found("User")));
        }
        let Some(product) = db.get_product(&req.product_id)? else {
            return Ok(Err(ApiError::not_found("Product")));
        };
        if product.quantity < ORDER_QUANTITY {
            return Ok(Err(ApiError::bad_request("Product out of stock")));
        }

        let transaction_id = Uuid::new_v4().to_string();
        let row = db.create_transaction(&NewTransaction {
            transaction_id: &transaction_id,
            user_id: &req.user_id,
            product_id: &product.product_id,
            quantity: ORDER_QUANTITY,
            address: &address,
            phone_number: &phone_number,
            total_price: product.price * ORDER_QUANTITY + SHIPPING_FEE,
            transaction_date: chrono::Utc::now().date_naive(),
        })?;
        Ok(Ok(row))
    })
    .await??;

    info!(
        "Order {} created for product {} (total {})",
        row.transaction_id, row.product_id, row.total_price
    );
    Ok(Json(transaction_response(row)))
}

pub async fn payment_details(
    State(state): State<AppState>,
    AppPath(transaction_id): AppPath<String>,
) -> ApiResult<Json<PaymentDetails>> {
    let row = load_transaction(&state, transaction_id).await?;
    Ok(Json(PaymentDetails {
        transaction_id: row.transaction_id,
        product_name: row.product_name,
        product_price: row.product_price,
        shipping_cost: SHIPPING_FEE,
        total_price: row.total_price,
        address: row.address,
        phone_number: row.phone_number,
        status: row.status,
    }))
}

pub async fn generate_payment_code(
    State(state): State<AppState>,
    AppPath(transaction_id): AppPath<String>,
) -> ApiResult<Json<PaymentCodeResponse>> {
    let row = load_transaction(&state, transaction_id).await?;
    if row.status != OrderStatus::PendingPayment.as_str() {
        return Err(ApiError::bad_request(
            "Transaction is not in pending payment status",
        ));
    }

    Ok(Json(PaymentCodeResponse {
        qris_code: payment_code(&row.transaction_id),
        transaction_id: row.transaction_id,
        total_amount: row.total_price,
        product_name: row.product_name,
    }))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    AppPath(transaction_id): AppPath<String>,
) -> ApiResult<Json<ConfirmPaymentResponse>> {
    let resi = tracking_code();
    let id = transaction_id.clone();
    let outcome = db_call(&state, move |db| db.confirm_payment(&id, &resi)).await?;

    match outcome {
        ConfirmOutcome::Confirmed(row) => {
            info!("Payment confirmed for {}", row.transaction_id);
            Ok(Json(ConfirmPaymentResponse {
                message: "Payment confirmed successfully".into(),
                transaction_id: row.transaction_id,
                resi: row.resi.unwrap_or_default(),
                status: row.status,
            }))
        }
        ConfirmOutcome::NotFound => Err(ApiError::not_found("Transaction")),
        ConfirmOutcome::NotPending(status) => {
            warn!(
                "Rejected confirmation of {} in status {}",
                transaction_id, status
            );
            Err(ApiError::bad_request(
                "Transaction is not in pending payment status",
            ))
        }
        ConfirmOutcome::OutOfStock => {
            warn!("Rejected confirmation of {}: product sold out", transaction_id);
            Err(ApiError::bad_request("Product is no longer available"))
        }
    }
}

pub async fn track_order(
    State(state): State<AppState>,
    AppPath(transaction_id): AppPath<String>,
) -> ApiResult<Json<TrackingResponse>> {
    let row = load_transaction(&state, transaction_id).await?;
    Ok(Json(TrackingResponse {
        transaction_id: row.transaction_id,
        product_name: row.product_name,
        resi: row.resi,
        status: row.status,
        address: row.address,
        phone_number: row.phone_number,
        total_price: row.total_price,
        transaction_date: row.transaction_date,
    }))
}

pub async fn list_user_transactions(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> ApiResult<Json<Vec<TransactionResponse>>> {
    let rows = db_call(&state, move |db| {
        if !db.user_exists(&user_id)? {
            return Ok(None);
        }
        db.list_user_transactions(&user_id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(rows.into_iter().map(transaction_response).collect()))
}

/// Manual status override. Free-form unless the server runs with strict
/// status checking, in which case only the named states and the transition
/// table are accepted.
pub async fn update_status(
    State(state): State<AppState>,
    AppPath(transaction_id): AppPath<String>,
    AppQuery(query): AppQuery<StatusUpdateQuery>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    let new_status = query.new_status.trim().to_string();
    if new_status.is_empty() {
        return Err(ApiError::bad_request("Status must not be empty"));
    }
    let resi = query
        .resi
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let strict_target = if state.strict_status {
        Some(new_status.parse::<OrderStatus>().map_err(ApiError::BadRequest)?)
    } else {
        None
    };

    let id = transaction_id.clone();
    let status = new_status.clone();
    let outcome = db_call(&state, move |db| {
        db.update_status(&id, &status, resi.as_deref(), |current| match strict_target {
            Some(next) => check_transition(current, next),
            None => Ok(()),
        })
    })
    .await?;

    match outcome {
        StatusOutcome::Updated(row) => {
            info!("Order {} status set to {}", row.transaction_id, row.status);
            Ok(Json(StatusUpdateResponse {
                message: format!("Order status updated to {}", row.status),
                transaction_id: row.transaction_id,
                status: row.status,
                resi: row.resi,
            }))
        }
        StatusOutcome::NotFound => Err(ApiError::not_found("Transaction")),
        StatusOutcome::Rejected(reason) => Err(ApiError::BadRequest(reason)),
    }
}

fn check_transition(current: &str, next: OrderStatus) -> Result<(), String> {
    let from: OrderStatus = current
        .parse()
        .map_err(|_| format!("Order has unrecognized status '{}'", current))?;
    if from.can_transition_to(next) {
        Ok(())
    } else {
        Err(format!("Cannot change order status from {} to {}", from, next))
    }
}

async fn load_transaction(state: &AppState, transaction_id: String) -> ApiResult<TransactionRow> {
    db_call(state, move |db| db.get_transaction(&transaction_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction"))
}

fn product_response(row: ProductRow) -> ProductResponse {
    ProductResponse {
        product_id: row.product_id,
        name: row.name,
        quantity: row.quantity,
        price: row.price,
        category: row.category,
        description: row.description,
        meaning_motif: row.meaning_motif,
        long_description: row.long_description,
        long_meaning_motif: row.long_meaning_motif,
        video_url: row.video_url,
        photo_url: row.photo_url,
    }
}

fn weaver_response(row: WeaverRow) -> WeaverResponse {
    WeaverResponse {
        weaver_id: row.weaver_id,
        name: row.name,
        bio: row.bio,
        address: row.address,
        phone_number: row.phone_number,
        specialization: row.specialization,
    }
}

fn transaction_response(row: TransactionRow) -> TransactionResponse {
    TransactionResponse {
        transaction_id: row.transaction_id,
        user_id: row.user_id,
        product_id: row.product_id,
        product_name: row.product_name,
        quantity: row.quantity,
        address: row.address,
        phone_number: row.phone_number,
        resi: row.resi,
        total_price: row.total_price,
        status: row.status,
        transaction_date: row.transaction_date,
    }
}
