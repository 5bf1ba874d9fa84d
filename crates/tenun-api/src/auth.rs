use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rand_core::OsRng;
use tracing::{info, warn};

use tenun_db::users::InsertUser;
use tenun_types::api::{LoginRequest, RegisterRequest, UserResponse};

use crate::error::{ApiError, ApiResult};
use crate::extract::AppJson;
use crate::state::{AppState, db_call};

const MAX_NAME_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 6;
const ID_ATTEMPTS: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = validate_name(&req.name)?;
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;

    let password_hash = hash_password(req.password).await?;

    for _ in 0..ID_ATTEMPTS {
        let user_id = generate_user_id();
        let (id, n, e, h) = (user_id.clone(), name.clone(), email.clone(), password_hash.clone());
        let outcome = db_call(&state, move |db| db.create_user(&id, &n, &e, &h)).await?;

        match outcome {
            InsertUser::Created => {
                info!("Registered user {}", user_id);
                return Ok((
                    StatusCode::CREATED,
                    Json(UserResponse {
                        user_id,
                        name,
                        email,
                    }),
                ));
            }
            InsertUser::EmailTaken => {
                return Err(ApiError::Conflict("Email already registered".into()));
            }
            InsertUser::IdTaken => {
                warn!("Generated user id {} collided, retrying", user_id);
            }
        }
    }

    Err(ApiError::Internal(anyhow::anyhow!(
        "could not allocate a unique user id after {} attempts",
        ID_ATTEMPTS
    )))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<Json<UserResponse>> {
    let email = req.email.trim().to_string();
    let user = db_call(&state, move |db| db.get_user_by_email(&email)).await?;

    // Unknown emails still pay for one verification.
    let stored_hash = match &user {
        Some(user) => user.password.clone(),
        None => state.dummy_hash.clone(),
    };
    let matches = verify_password(req.password, stored_hash).await?;

    match user {
        Some(user) if matches => {
            info!("User {} logged in", user.user_id);
            Ok(Json(UserResponse {
                user_id: user.user_id,
                name: user.name,
                email: user.email,
            }))
        }
        _ => Err(ApiError::Unauthorized("Invalid email or password".into())),
    }
}

/// Eight upper-case hex characters.
fn generate_user_id() -> String {
    format!("{:08X}", rand::random::<u32>())
}

pub(crate) fn validate_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> ApiResult<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(ApiError::bad_request("Invalid email address")),
    }
}

pub(crate) fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Argon2id PHC string with a fresh random salt.
pub(crate) fn hash_password_blocking(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
}

fn verify_password_blocking(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub(crate) async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("hashing task failed: {}", e)))?
        .map_err(ApiError::Internal)
}

pub(crate) async fn verify_password(password: String, stored_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("verification task failed: {}", e)))?
        .map_err(ApiError::Internal)
}
