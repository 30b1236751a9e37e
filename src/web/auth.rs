use super::*;
use axum::extract::ConnectInfo;
use regex::Regex;
use std::net::SocketAddr;
use std::sync::OnceLock;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 32;
const PASSWORD_MIN_CHARS: usize = 8;

fn username_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").ok())
        .as_ref()
}

fn email_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

fn is_valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email))
}

/// String field from a JSON body; non-string values count as missing.
fn string_field<'a>(body: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    body.get(name).and_then(|v| v.as_str())
}

fn json_body(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<serde_json::Value, ApiError> {
    match body {
        Ok(Json(value)) if value.is_object() => Ok(value),
        _ => Err(ApiError::invalid_input(vec![FieldError::new(
            "body",
            "Expected a JSON object",
        )])),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(super) struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub(super) fn validate_registration(body: &serde_json::Value) -> Result<Registration, ApiError> {
    let mut errors = Vec::new();

    let username = string_field(body, "username").map(str::trim);
    match username {
        None => errors.push(FieldError::new("username", "Username is required")),
        Some(u) => {
            let len = u.chars().count();
            if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
                errors.push(FieldError::new(
                    "username",
                    format!(
                        "Username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"
                    ),
                ));
            } else if !username_pattern().is_some_and(|re| re.is_match(u)) {
                errors.push(FieldError::new(
                    "username",
                    "Username may only contain letters, numbers, '_', '-' and '.'",
                ));
            }
        }
    }

    let email = string_field(body, "email").map(str::trim);
    match email {
        None => errors.push(FieldError::new("email", "Email is required")),
        Some(e) if !is_valid_email(e) => {
            errors.push(FieldError::new("email", "Invalid email address"))
        }
        Some(_) => {}
    }

    let password = string_field(body, "password");
    match password {
        None => errors.push(FieldError::new("password", "Password is required")),
        Some(p) if p.chars().count() < PASSWORD_MIN_CHARS => errors.push(FieldError::new(
            "password",
            format!("Password must be at least {PASSWORD_MIN_CHARS} characters"),
        )),
        Some(_) => {}
    }

    match (username, email, password) {
        (Some(u), Some(e), Some(p)) if errors.is_empty() => Ok(Registration {
            username: u.to_string(),
            email: e.to_string(),
            password: p.to_string(),
        }),
        _ => Err(ApiError::invalid_input(errors)),
    }
}

pub(super) fn validate_login(body: &serde_json::Value) -> Result<(String, String), ApiError> {
    let mut errors = Vec::new();
    let email = string_field(body, "email").map(str::trim);
    match email {
        None => errors.push(FieldError::new("email", "Email is required")),
        Some(e) if !is_valid_email(e) => {
            errors.push(FieldError::new("email", "Invalid email address"))
        }
        Some(_) => {}
    }
    let password = string_field(body, "password").filter(|p| !p.is_empty());
    if password.is_none() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    match (email, password) {
        (Some(e), Some(p)) if errors.is_empty() => Ok((e.to_string(), p.to_string())),
        _ => Err(ApiError::invalid_input(errors)),
    }
}

fn user_json(user: &User) -> serde_json::Value {
    json!({"id": user.id, "username": user.username, "email": user.email})
}

fn session_expiry(
    now: chrono::DateTime<chrono::Utc>,
    ttl_hours: i64,
) -> Option<chrono::DateTime<chrono::Utc>> {
    now.checked_add_signed(chrono::Duration::try_hours(ttl_hours)?)
}

/// Create a session row and return the `Set-Cookie` header for it.
async fn start_session(state: &WebState, user_id: i64) -> Result<String, ApiError> {
    let token = new_session_token();
    let token_hash = sha256_hex(&token);
    let expires_at = session_expiry(chrono::Utc::now(), state.app_state.config.session_ttl_hours)
        .ok_or_else(|| {
            ApiError::internal("Failed to create session", "session expiry out of range")
        })?
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let expires_http = http_date(&expires_at);
    call_blocking(state.app_state.db.clone(), move |db| {
        db.create_auth_session(&token_hash, user_id, &expires_at)
    })
    .await?;
    Ok(session_cookie_header(
        &token,
        &expires_http,
        state.app_state.config.secure_cookies(),
    ))
}

pub(super) async fn api_auth_status(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match session_user(&state, &headers).await? {
        Some(user_id) => Ok(Json(json!({"authenticated": true, "userId": user_id}))),
        None => Ok(Json(json!({"authenticated": false}))),
    }
}

pub(super) async fn api_auth_register(
    State(state): State<WebState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(body)?;
    let reg = validate_registration(&body)?;

    let email = reg.email.clone();
    if call_blocking(state.app_state.db.clone(), move |db| db.get_user_by_email(&email))
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request("Email already in use"));
    }
    let username = reg.username.clone();
    if call_blocking(state.app_state.db.clone(), move |db| {
        db.get_user_by_username(&username)
    })
    .await?
    .is_some()
    {
        return Err(ApiError::bad_request("Username already taken"));
    }

    let hash = make_password_hash(&reg.password);
    if hash.is_empty() {
        return Err(ApiError::internal(
            "Failed to register user",
            "password hashing failed",
        ));
    }
    let Registration {
        username, email, ..
    } = reg;
    let user = match call_blocking(state.app_state.db.clone(), move |db| {
        db.create_user(&username, &email, &hash)
    })
    .await
    {
        Ok(user) => user,
        // Lost a race with a concurrent registration.
        Err(HopeBotError::Duplicate(_)) => {
            return Err(ApiError::bad_request("Email already in use"))
        }
        Err(e) => return Err(ApiError::internal("Failed to register user", e)),
    };

    let cookie = start_session(&state, user.id).await?;
    info!(user_id = user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        [("set-cookie", cookie)],
        Json(json!({
            "message": "User created successfully",
            "user": user_json(&user)
        })),
    ))
}

pub(super) async fn api_auth_login(
    headers: HeaderMap,
    State(state): State<WebState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let config = &state.app_state.config;
    let client_key = login_client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        config.trust_x_forwarded_for,
    );
    let allowed = state
        .auth_hub
        .allow_login_attempt(
            &client_key,
            config.login_max_attempts,
            Duration::from_secs(config.login_window_seconds),
        )
        .await;
    if !allowed {
        warn!(client = %client_key, "Login throttled");
        return Err(ApiError::too_many_requests("Too many login attempts"));
    }

    let body = json_body(body)?;
    let (email, password) = validate_login(&body)?;

    let user = call_blocking(state.app_state.db.clone(), move |db| db.get_user_by_email(&email))
        .await?;
    let Some(user) = user.filter(|u| verify_password_hash(&u.password_hash, &password)) else {
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    state.auth_hub.clear_login_attempts(&client_key).await;
    let cookie = start_session(&state, user.id).await?;
    info!(user_id = user.id, "User logged in");
    Ok((
        StatusCode::OK,
        [("set-cookie", cookie)],
        Json(json!({
            "message": "Login successful",
            "user": user_json(&user)
        })),
    ))
}

pub(super) async fn api_auth_logout(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        let token_hash = sha256_hex(&token);
        call_blocking(state.app_state.db.clone(), move |db| {
            db.revoke_auth_session(&token_hash)
        })
        .await
        .map_err(|e| ApiError::internal("Failed to logout", e))?;
    }
    Ok((
        StatusCode::OK,
        [(
            "set-cookie",
            clear_session_cookie_header(state.app_state.config.secure_cookies()),
        )],
        Json(json!({"message": "Logout successful"})),
    ))
}

pub(super) async fn api_users_me(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let user = call_blocking(state.app_state.db.clone(), move |db| db.get_user(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user_json(&user)))
}
