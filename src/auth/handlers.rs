use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, Constraint, constraint_violation},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, RegisterReq, TokenType},
    utils::email_index::EmailIndex,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Current state of an account, re-read whenever tokens are rotated.
#[derive(Debug, sqlx::FromRow)]
struct AccountState {
    email: String,
    role_id: u8,
    organization_id: Option<u64>,
    is_active: bool,
}

/// Tokens are only rotated for accounts that still exist and are active.
fn active_account(account: Option<AccountState>) -> Result<AccountState, AppError> {
    match account {
        None => Err(AppError::Unauthorized("Account no longer exists".into())),
        Some(account) if !account.is_active => Err(AppError::forbidden("Account is disabled")),
        Some(account) => Ok(account),
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and stores the refresh `jti`.
async fn issue_tokens<'c, E>(
    executor: E,
    user_id: u64,
    email: &str,
    role: u8,
    organization_id: Option<u64>,
    config: &Config,
) -> Result<TokenPair, AppError>
where
    E: sqlx::Executor<'c, Database = sqlx::MySql>,
{
    let access_token = generate_access_token(
        user_id,
        email.to_string(),
        role,
        organization_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        email.to_string(),
        role,
        organization_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(executor)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// User registration handler
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all, fields(email = %user.email))]
pub async fn register(
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    emails: web::Data<EmailIndex>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner();
    let email = user.email.trim().to_lowercase();

    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }
    if user.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if user.first_name.trim().is_empty() || user.last_name.trim().is_empty() {
        return Err(AppError::validation("First and last name must not be empty"));
    }

    if !emails.is_available(&email, pool.get_ref()).await {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    if let Some(organization_id) = user.organization_id {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE id = ? LIMIT 1)",
        )
        .bind(organization_id)
        .fetch_one(pool.get_ref())
        .await?;
        if exists == 0 {
            return Err(AppError::validation(format!(
                "Organization {organization_id} does not exist"
            )));
        }
    }

    let hashed = hash_password(&user.password)?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password, first_name, last_name, role_id, organization_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(hashed)
    .bind(user.first_name.trim())
    .bind(user.last_name.trim())
    .bind(Role::Member.id())
    .bind(user.organization_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| match constraint_violation(&e) {
        Some(Constraint::Unique) => AppError::Conflict("Email already registered".into()),
        Some(Constraint::ForeignKey) => AppError::validation("Organization does not exist"),
        None => AppError::Database(e),
    })?;

    emails.register(&email).await;
    info!("User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully"
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let email = user.email.trim().to_lowercase();
    if email.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(AppError::validation("Email and password are required"));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password, first_name, last_name, role_id, organization_id, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Database error while fetching user");
        AppError::Database(e)
    })?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::Unauthorized("Invalid credentials".into())
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(AppError::forbidden("Account is disabled"));
    }

    let tokens = issue_tokens(
        pool.get_ref(),
        db_user.id,
        &db_user.email,
        db_user.role_id,
        db_user.organization_id,
        &config,
    )
    .await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW(6) WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid, or revoked refresh token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims: Claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, (u64, u64, i8)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let (token_id, user_id) = match record {
        Some((id, user_id, 0)) => (id, user_id),
        _ => return Err(AppError::Unauthorized("Refresh token revoked".into())),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

    // role and organization may have changed since the old token was issued
    let account = sqlx::query_as::<_, AccountState>(
        "SELECT email, role_id, organization_id, is_active FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let account = active_account(account)?;

    let tokens = issue_tokens(
        &mut *tx,
        user_id,
        &account.email,
        account.role_id,
        account.organization_id,
        &config,
    )
    .await?;

    tx.commit().await?;

    debug!(user_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Refresh token revoked (or nothing to revoke)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can be revoked
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

/// Identity of the caller, as carried by the access token.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Authenticated user", body = AuthUser),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(auth)
}
