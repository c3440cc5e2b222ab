use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use ember_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if !req.email.contains('@') || req.email.len() > 254 {
        return Err(ember_db::error::StoreError::Validation("invalid email".into()).into());
    }
    if req.password.len() < 8 {
        return Err(ember_db::error::StoreError::Validation(
            "password must be at least 8 characters".into(),
        )
        .into());
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::internal(format!("password hash: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let email = req.email.clone();
    blocking(move || db.create_user(&user_id.to_string(), &email, &password_hash)).await?;

    let token = create_token(&state.jwt_secret, user_id)
        .map_err(|e| ApiError::internal(format!("token: {e}")))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            token,
            needs_profile: true,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let email = req.email.clone();
    let user = blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::internal(format!("stored hash: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::internal(format!("corrupt user id: {e}")))?;

    let db = state.db.clone();
    let profile = blocking(move || db.get_profile(&user_id.to_string())).await?;

    let token = create_token(&state.jwt_secret, user_id)
        .map_err(|e| ApiError::internal(format!("token: {e}")))?;

    Ok(Json(AuthResponse {
        user_id,
        token,
        needs_profile: profile.is_none(),
    }))
}

fn create_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
