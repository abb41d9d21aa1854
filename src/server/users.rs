use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::server::AppState;
use crate::server::dto::{ConfirmUserParams, DeleteUserParams, GetUserParams, UpdateUserParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::validate_username;
use crate::types::{NewUser, User};

pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/user", get(get_user))
        .route("/confirm", get(confirm_user))
        .route("/add", post(create_user))
        .route("/update", post(update_user))
        .route("/delete", delete(delete_user))
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let users = state.store.list_users()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetUserParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let user = if let Some(id) = params.user_id {
        store.get_user(id)?.or_bad_request("User not found by userId")?
    } else if let Some(username) = params.username.as_deref() {
        store
            .get_user_by_username(username)?
            .or_bad_request("User not found by username")?
    } else {
        return Err(ApiError::bad_request(
            "Either userId or username must be provided",
        ));
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

/// Checks a username/password pair. The comparison is plaintext equality,
/// kept faithful to the system this replaces; a known security gap.
pub async fn confirm_user(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfirmUserParams>,
) -> impl IntoResponse {
    let (Some(username), Some(password)) = (
        params.username.filter(|u| !u.trim().is_empty()),
        params.password.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Username and password are required"));
    };

    let Some(user) = state.store.get_user_by_username(&username)? else {
        return Err(ApiError::bad_request("This username does not exist"));
    };

    if user.password != password {
        return Err(ApiError::bad_request("Password does not match"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success("User exists and password matches")))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewUser>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_username(&req.username)?;
    if req.password.is_empty() {
        return Err(ApiError::bad_request("Password cannot be empty"));
    }

    if store.get_user_by_username(&req.username)?.is_some() {
        return Err(ApiError::bad_request("Username already exists"));
    }

    let user = store.create_user(&req)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateUserParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let old = store
        .get_user(params.user_id)?
        .or_bad_request("User not found by userId")?;

    if params.username.is_none() && params.password.is_none() && params.position.is_none() {
        return Err(ApiError::bad_request("No value for this update is specified"));
    }

    let mut user = User { ..old };
    if let Some(username) = params.username {
        validate_username(&username)?;
        if username != user.username && store.get_user_by_username(&username)?.is_some() {
            return Err(ApiError::bad_request("Username already exists"));
        }
        user.username = username;
    }
    if let Some(password) = params.password {
        if password.is_empty() {
            return Err(ApiError::bad_request("Password cannot be empty"));
        }
        user.password = password;
    }
    if let Some(position) = params.position {
        user.position = Some(position);
    }

    store.update_user(&user)?;
    Ok::<_, ApiError>(Json(ApiResponse::success("Successfully updated")))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteUserParams>,
) -> impl IntoResponse {
    let deleted = state.store.delete_user(params.user_id)?;
    if !deleted {
        return Err(ApiError::bad_request("User not found by userId"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success("Successfully deleted")))
}
