//! Authentication and account management endpoints
//!
//! `/api/auth/setup` seeds the three household accounts exactly once;
//! after that, account management is admin-only through `/api/auth/users`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use biblio_common::models::{Reviewer, Role, User};

use crate::auth::{self, AuthUser};
use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MIN_PASSWORD_LENGTH: usize = 6;

/// Account shape returned to clients; never includes the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub review_key: Option<Reviewer>,
    pub avatar: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.guid,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            review_key: user.review_key,
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// POST /api/auth/login
///
/// A wrong email and a wrong password are indistinguishable to the
/// caller.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let user = users::find_user_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;

    if !auth::verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let token = auth::issue_token(user.guid, &state.config.jwt_secret)?;
    tracing::info!(username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

async fn ensure_email_free(state: &AppState, email: &str, own: Uuid) -> ApiResult<()> {
    if let Some(other) = users::find_user_by_email(&state.db, email).await? {
        if other.guid != own {
            return Err(ApiError::BadRequest(
                "this email is already in use".to_string(),
            ));
        }
    }
    Ok(())
}

async fn ensure_username_free(state: &AppState, username: &str, own: Uuid) -> ApiResult<()> {
    if let Some(other) = users::find_user_by_username(&state.db, username).await? {
        if other.guid != own {
            return Err(ApiError::BadRequest(
                "this username is already in use".to_string(),
            ));
        }
    }
    Ok(())
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    Json(request): Json<ProfileUpdateRequest>,
) -> ApiResult<Json<UserResponse>> {
    if let Some(email) = request.email {
        let email = email.trim().to_lowercase();
        if !email.is_empty() && email != user.email {
            ensure_email_free(&state, &email, user.guid).await?;
            user.email = email;
        }
    }
    if let Some(username) = request.username {
        let username = username.trim().to_string();
        if !username.is_empty() && username != user.username {
            ensure_username_free(&state, &username, user.guid).await?;
            user.username = username;
        }
    }
    if let Some(avatar) = request.avatar {
        user.avatar = avatar;
    }
    if let Some(bio) = request.bio {
        user.bio = bio;
    }
    user.updated_at = Utc::now();

    users::update_user(&state.db, &user).await?;
    Ok(Json(UserResponse::from(&user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "current and new password are required".to_string(),
        ));
    }
    if request.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "the new password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if !auth::verify_password(&request.current_password, &user.password_hash) {
        return Err(ApiError::Unauthorized(
            "current password is incorrect".to_string(),
        ));
    }

    user.password_hash = auth::hash_password(&request.new_password)?;
    user.updated_at = Utc::now();
    users::update_user(&state.db, &user).await?;

    Ok(Json(json!({ "message": "password updated" })))
}

/// GET /api/auth/users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    user.require_admin()?;
    let users = users::list_users(&state.db).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub review_key: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

fn parse_review_key(value: Option<&str>) -> ApiResult<Option<Reviewer>> {
    match value {
        None => Ok(None),
        Some(key) if key.is_empty() => Ok(None),
        Some(key) => Reviewer::parse(key)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown reviewer {}", key))),
    }
}

/// POST /api/auth/users (admin)
pub async fn create_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    admin.require_admin()?;

    let username = request.username.trim();
    let email = request.email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username, email and password are required".to_string(),
        ));
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "the password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    ensure_email_free(&state, &email, Uuid::nil()).await?;
    ensure_username_free(&state, username, Uuid::nil()).await?;

    let now = Utc::now();
    let user = User {
        guid: Uuid::new_v4(),
        username: username.to_string(),
        email,
        password_hash: auth::hash_password(&request.password)?,
        role: request.role.unwrap_or(Role::User),
        review_key: parse_review_key(request.review_key.as_deref())?,
        avatar: request.avatar.unwrap_or_default(),
        bio: request.bio.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    users::insert_user(&state.db, &user).await?;
    tracing::info!(username = %user.username, "Created user");

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Present-but-null clears the review key
    #[serde(default)]
    pub review_key: Option<Option<String>>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// PUT /api/auth/users/:id (admin)
pub async fn update_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    admin.require_admin()?;

    let mut user = users::load_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", id)))?;

    if let Some(email) = request.email {
        let email = email.trim().to_lowercase();
        if !email.is_empty() && email != user.email {
            ensure_email_free(&state, &email, user.guid).await?;
            user.email = email;
        }
    }
    if let Some(username) = request.username {
        let username = username.trim().to_string();
        if !username.is_empty() && username != user.username {
            ensure_username_free(&state, &username, user.guid).await?;
            user.username = username;
        }
    }
    if let Some(password) = request.password {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::BadRequest(format!(
                "the password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        user.password_hash = auth::hash_password(&password)?;
    }
    if let Some(role) = request.role {
        user.role = role;
    }
    if let Some(review_key) = request.review_key {
        user.review_key = parse_review_key(review_key.as_deref())?;
    }
    if let Some(avatar) = request.avatar {
        user.avatar = avatar;
    }
    if let Some(bio) = request.bio {
        user.bio = bio;
    }
    user.updated_at = Utc::now();

    users::update_user(&state.db, &user).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// DELETE /api/auth/users/:id (admin, cannot delete own account)
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    admin.require_admin()?;

    if id == admin.0.guid {
        return Err(ApiError::BadRequest(
            "you cannot delete your own account".to_string(),
        ));
    }

    if !users::delete_user(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("user {} not found", id)));
    }

    Ok(Json(json!({ "message": "user deleted" })))
}

/// POST /api/auth/setup
///
/// One-shot seeding of the admin account and the two reviewer accounts.
/// Refused once any user exists.
pub async fn setup(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    if users::count_users(&state.db).await? > 0 {
        return Err(ApiError::BadRequest(
            "accounts have already been set up".to_string(),
        ));
    }

    let seeds: [(&str, &str, &str, Role, Option<Reviewer>); 3] = [
        (
            "Admin",
            "admin@nuestrabiblioteca.com",
            "admin123",
            Role::Admin,
            None,
        ),
        (
            "Adaly",
            "adaly@arcia.net",
            "adaly123",
            Role::User,
            Some(Reviewer::Adaly),
        ),
        (
            "Sebastian",
            "tatan@rodrigo.lat",
            "sebastian123",
            Role::User,
            Some(Reviewer::Sebastian),
        ),
    ];

    let mut created = Vec::new();
    for (username, email, password, role, review_key) in seeds {
        let now = Utc::now();
        let user = User {
            guid: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: auth::hash_password(password)?,
            role,
            review_key,
            avatar: String::new(),
            bio: String::new(),
            created_at: now,
            updated_at: now,
        };
        users::insert_user(&state.db, &user).await?;
        created.push(json!({ "username": username, "email": email }));
    }

    tracing::info!("Seeded initial accounts");
    Ok(Json(json!({ "message": "accounts created", "users": created })))
}

/// Build auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/profile", put(update_profile))
        .route("/api/auth/change-password", put(change_password))
        .route("/api/auth/users", get(list_users).post(create_user))
        .route(
            "/api/auth/users/:id",
            put(update_user).delete(delete_user),
        )
        .route("/api/auth/setup", post(setup))
}
