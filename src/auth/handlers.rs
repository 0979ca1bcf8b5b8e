use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use jsonwebtoken::errors::ErrorKind;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MessageResponse, PublicUser, RegisterRequest, VerifyResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{is_unique_violation, User},
        validate,
    },
    error::ApiError,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify", post(verify))
        .route("/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.username = payload.username.trim().to_lowercase();
    payload.email = payload.email.trim().to_lowercase();

    let errors = validate::registration_errors(&payload.username, &payload.email, &payload.password);
    if !errors.is_empty() {
        warn!(email = %payload.email, ?errors, "registration rejected");
        return Err(ApiError::Validation(errors));
    }

    if let Some(existing) = User::find_conflict(&state.db, &payload.username, &payload.email).await?
    {
        warn!(email = %payload.email, "registration conflict");
        let message = if existing.email == payload.email {
            "Email already registered"
        } else {
            "Username already taken"
        };
        return Err(ApiError::Conflict(message.into()));
    }

    let hash = hash_password(&payload.password)?;

    // The pre-check leaves a race window; a concurrent insert surfaces here
    // as a unique violation and is still a conflict, not a 500.
    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "registration lost insert race");
            return Err(ApiError::Conflict("Email or username already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".into(),
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = Vec::new();
    if payload.email.is_empty() {
        errors.push("Email is required".to_string());
    }
    if payload.password.is_empty() {
        errors.push("Password is required".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Unknown email and wrong password answer identically.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        user: PublicUser::from(&user),
    }))
}

/// Token check for clients restoring a stored session. Unlike the auth guard,
/// every failure here is a 401 so the client treats them all as "log in again".
#[instrument(skip(state, headers))]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, ApiError> {
    let token = crate::auth::extractors::bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "verify rejected token");
        if matches!(e.kind(), ErrorKind::ExpiredSignature) {
            ApiError::Unauthorized("Token expired".into())
        } else {
            ApiError::Unauthorized("Invalid token".into())
        }
    })?;

    // The token may outlive the account.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    Ok(Json(VerifyResponse {
        valid: true,
        user: PublicUser::from(&user),
    }))
}

pub async fn logout() -> Json<MessageResponse> {
    // Sessions are stateless JWTs; logout exists for client-side cleanup.
    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}
