use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use expanse_db::now_ts;
use expanse_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use expanse_types::envelope::Envelope;
use expanse_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::run_blocking;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Name must not be empty".into()));
    }

    let email = req.email.trim().to_ascii_lowercase();
    let Some(domain) = email_domain(&email) else {
        return Err(ApiError::Validation("Email address is not valid".into()));
    };

    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let db = state.clone();
    let lookup = email.clone();
    if run_blocking(move || db.db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let role = role_for_domain(&domain, &state.teacher_domains);

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();

    let db = state.clone();
    let (uid, uname, uemail) = (user_id.to_string(), name.clone(), email.clone());
    run_blocking(move || db.db.create_user(&uid, &uname, &uemail, &password_hash, role, &now_ts()))
        .await?;

    info!("Registered {} as {}", email, role);

    let token = create_token(&state.jwt_secret, user_id, &name, role)?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            RegisterResponse {
                user_id,
                role,
                token,
            },
            "User registered successfully",
        )),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_ascii_lowercase();

    let db = state.clone();
    let user = run_blocking(move || db.db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Stored password hash unreadable: {e}")))?;

    // Unknown email and wrong password are indistinguishable to the caller.
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id = crate::parse_uuid(&user.id);
    let role = user.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("Corrupt role '{}' on user '{}': {}", user.role, user.id, e);
        Role::Student
    });

    let token = create_token(&state.jwt_secret, user_id, &user.name, role)?;

    Ok(Json(Envelope::success(
        LoginResponse {
            user_id,
            name: user.name,
            role,
            token,
        },
        "Login successful",
    )))
}

fn create_token(secret: &str, user_id: Uuid, name: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Split off the domain of a plausible email address; None when the address
/// has no usable local part or domain.
fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return None;
    }
    Some(domain.to_string())
}

fn role_for_domain(domain: &str, teacher_domains: &[String]) -> Role {
    if teacher_domains.iter().any(|d| d == domain) {
        Role::Teacher
    } else {
        Role::Student
    }
}
