use axum::{
    Json,
    extract::State,
};
use tracing::info;

use tenun_db::models::UserRow;
use tenun_types::api::{MessageBody, UpdateNameRequest, UpdatePasswordRequest, UserResponse};

use crate::auth::{hash_password, validate_name, validate_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath};
use crate::state::{AppState, db_call};

pub async fn get_profile(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(UserResponse {
        user_id: user.user_id,
        name: user.name,
        email: user.email,
    }))
}

pub async fn update_name(
    State(state): State<AppState>,
    AppJson(req): AppJson<UpdateNameRequest>,
) -> ApiResult<Json<UserResponse>> {
    let new_name = validate_name(&req.new_name)?;
    let user = load_user(&state, req.user_id).await?;
    require_password(req.password, &user).await?;

    let (id, name) = (user.user_id.clone(), new_name.clone());
    if !db_call(&state, move |db| db.update_user_name(&id, &name)).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("User {} changed name", user.user_id);
    Ok(Json(UserResponse {
        user_id: user.user_id,
        name: new_name,
        email: user.email,
    }))
}

pub async fn update_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<UpdatePasswordRequest>,
) -> ApiResult<Json<MessageBody>> {
    validate_password(&req.new_password)?;
    let user = load_user(&state, req.user_id).await?;
    require_password(req.old_password, &user).await?;

    let new_hash = hash_password(req.new_password).await?;
    let id = user.user_id.clone();
    if !db_call(&state, move |db| db.update_user_password(&id, &new_hash)).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("User {} changed password", user.user_id);
    Ok(Json(MessageBody {
        message: "Password updated successfully".into(),
    }))
}

async fn load_user(state: &AppState, user_id: String) -> ApiResult<UserRow> {
    db_call(state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

async fn require_password(password: String, user: &UserRow) -> ApiResult<()> {
    if verify_password(password, user.password.clone()).await? {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Current password is incorrect".into()))
    }
}
