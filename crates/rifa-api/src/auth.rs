use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{error, info};
use uuid::Uuid;

use rifa_db::Database;
use rifa_types::api::{
    Claims, LoginRequest, LoginResponse, ProfileResponse, RegisterRequest, RegisterResponse,
    UpdateProfileRequest,
};
use rifa_types::models::{Profile, Role};

use crate::error::ApiError;
use crate::{AppState, blocking};

const TOKEN_TTL_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let name = req.name.trim().to_string();
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::bad_request("a valid email is required"));
    }
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let admin_email = state.admin_email.clone();
    let phone = req.phone.clone();

    let profile = new_profile(user_id, &email, &name, phone, admin_email.as_deref(), now);
    let created = blocking(&state, move |db| db.register_user(&profile, &password_hash)).await?;

    if !created {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    info!("Registered user {}", user_id);
    let token = create_token(&state.jwt_secret, user_id, &email)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("Stored password hash for {} is unreadable: {}", user.id, e);
        ApiError::Internal
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user.id.parse().map_err(|e| {
        error!("Corrupt user id '{}': {}", user.id, e);
        ApiError::Internal
    })?;

    let token = create_token(&state.jwt_secret, user_id, &user.email)?;
    let profile = ensure_profile(&state, user_id, &user.email).await?;

    Ok(Json(LoginResponse {
        user_id,
        token,
        profile,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = ensure_profile(&state, claims.sub, &claims.email).await?;
    Ok(Json(ProfileResponse { profile }))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("name cannot be empty"));
    }

    ensure_profile(&state, claims.sub, &claims.email).await?;
    let now = Utc::now();
    let id = claims.sub;
    let profile = blocking(&state, move |db| {
        db.update_profile(
            id,
            req.name.as_deref().map(str::trim),
            req.phone.as_deref(),
            now,
        )
    })
    .await?
    .ok_or_else(|| ApiError::not_found("profile not found"))?;

    Ok(Json(ProfileResponse { profile }))
}

/// Return the caller's profile, creating it on first access.
pub(crate) async fn ensure_profile(
    state: &AppState,
    id: Uuid,
    email: &str,
) -> Result<Profile, ApiError> {
    let email = email.to_string();
    let admin_email = state.admin_email.clone();
    let now = Utc::now();

    blocking(state, move |db| load_or_create_profile(db, id, &email, admin_email.as_deref(), now))
        .await?
        .ok_or(ApiError::Unauthorized)
}

fn load_or_create_profile(
    db: &Database,
    id: Uuid,
    email: &str,
    admin_email: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Profile>> {
    if let Some(profile) = db.get_profile(id)? {
        return Ok(Some(profile));
    }
    // Tokens outlive deleted accounts; no user row means no profile.
    let Some(user) = db.get_user_by_id(id)? else {
        return Ok(None);
    };
    db.insert_profile(&new_profile(id, email, &user.name, user.phone, admin_email, now))?;
    db.get_profile(id)
}

fn new_profile(
    id: Uuid,
    email: &str,
    name: &str,
    phone: Option<String>,
    admin_email: Option<&str>,
    now: DateTime<Utc>,
) -> Profile {
    let role = match admin_email {
        Some(admin) if admin.eq_ignore_ascii_case(email) => Role::Admin,
        _ => Role::User,
    };
    Profile {
        id,
        email: email.to_string(),
        name: name.to_string(),
        phone,
        role,
        created_at: now,
        updated_at: now,
    }
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}
