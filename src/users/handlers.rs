use axum::{
    extract::State,
    routing::{delete, get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::AuthUser,
        password::{hash_password, verify_password},
        repo::{is_unique_violation, User},
        validate,
    },
    error::ApiError,
    state::AppState,
};

use super::dto::{
    ChangePasswordRequest, DeleteAccountRequest, Profile, ProfileResponse, Stats, StatsResponse,
    StatusResponse, UpdateProfileRequest, UpdateProfileResponse, UpdatedProfile,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/stats", get(get_stats))
        .route("/change-password", put(change_password))
        .route("/account", delete(delete_account))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ProfileResponse {
        success: true,
        user: Profile::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, ApiError> {
    payload.username = payload.username.trim().to_lowercase();
    payload.email = payload.email.trim().to_lowercase();

    let errors = validate::profile_errors(&payload.username, &payload.email);
    if !errors.is_empty() {
        warn!(user_id = %user_id, ?errors, "profile update rejected");
        return Err(ApiError::Validation(errors));
    }

    if let Some(existing) =
        User::find_conflict_excluding(&state.db, &payload.username, &payload.email, user_id).await?
    {
        warn!(user_id = %user_id, "profile update conflict");
        let message = if existing.email == payload.email {
            "Email already in use by another account"
        } else {
            "Username already taken"
        };
        return Err(ApiError::Conflict(message.into()));
    }

    let user = match User::update_profile(&state.db, user_id, &payload.username, &payload.email)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::NotFound("User not found".into())),
        Err(e) if is_unique_violation(&e) => {
            warn!(user_id = %user_id, "profile update lost race");
            return Err(ApiError::Conflict("Username or email already in use".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, username = %user.username, "profile updated");
    Ok(Json(UpdateProfileResponse {
        success: true,
        message: "Profile updated successfully".into(),
        user: UpdatedProfile::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<StatsResponse>, ApiError> {
    let (total_users, user) = tokio::try_join!(
        User::count(&state.db),
        User::find_by_id(&state.db, user_id),
    )?;
    let user = user.ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(StatsResponse {
        success: true,
        stats: Stats {
            total_users,
            member_since: user.created_at,
            current_user_id: user_id,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "Current password and new password are required".into(),
        ));
    }
    if payload.new_password.chars().count() < 6 {
        return Err(ApiError::BadRequest(
            "New password must be at least 6 characters long".into(),
        ));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id = %user_id, "change password with wrong current password");
        return Err(ApiError::Unauthorized("Current password is incorrect".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    if !User::update_password(&state.db, user_id, &hash).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %user_id, "password changed");
    Ok(Json(StatusResponse {
        success: true,
        message: "Password changed successfully".into(),
    }))
}

/// Hard-deletes the account after re-confirming the password.
#[instrument(skip(state, payload))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Password confirmation is required to delete account".into(),
        ));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user_id, "account deletion with wrong password");
        return Err(ApiError::Unauthorized("Password is incorrect".into()));
    }

    if !User::delete(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %user_id, "account deleted");
    Ok(Json(StatusResponse {
        success: true,
        message: "Account deleted successfully".into(),
    }))
}
