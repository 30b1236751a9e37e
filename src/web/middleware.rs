use super::*;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, SocketAddr};

pub(super) const SESSION_COOKIE: &str = "hb_session";

pub(super) fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Opaque random token handed to the browser. Only its hash is stored.
pub(super) fn new_session_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub(super) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    for part in raw.split(';') {
        let mut kv = part.trim().splitn(2, '=');
        let k = kv.next()?.trim();
        let v = kv.next().unwrap_or("").trim();
        if k == name && !v.is_empty() {
            return Some(v.to_string());
        }
    }
    None
}

pub(super) fn session_cookie_header(token: &str, expires_at: &str, secure: bool) -> String {
    let mut header = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Expires={expires_at}"
    );
    if secure {
        header.push_str("; Secure");
    }
    header
}

pub(super) fn clear_session_cookie_header(secure: bool) -> String {
    let mut header = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        header.push_str("; Secure");
    }
    header
}

/// Cookie `Expires` attribute for an RFC 3339 timestamp.
pub(super) fn http_date(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string()
        })
        .unwrap_or_else(|_| "Tue, 19 Jan 2038 03:14:07 GMT".to_string())
}

/// Empty string when hashing fails; such a hash never verifies.
pub(super) fn make_password_hash(password: &str) -> String {
    let Ok(salt) = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes()) else {
        return String::new();
    };
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .unwrap_or_default()
}

pub(super) fn verify_password_hash(stored: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Throttle key for login attempts. `X-Forwarded-For` is only read when the
/// deployment trusts its proxy; otherwise the peer address is the key.
pub(super) fn login_client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        if let Some(ip) = parse_forwarded_client_ip(headers) {
            return ip;
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "global".to_string())
}

fn parse_forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    raw.split(',')
        .find_map(|part| normalize_forwarded_ip(part.trim()))
}

fn normalize_forwarded_ip(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    if let Some(rest) = value.strip_prefix('[') {
        let (host, _) = rest.split_once("]:")?;
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip.to_string());
        }
        return None;
    }

    if let Some((host, port)) = value.rsplit_once(':') {
        if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Some(ip.to_string());
            }
        }
    }
    None
}

/// User id behind the request's session cookie, if the session is live.
pub(super) async fn session_user(
    state: &WebState,
    headers: &HeaderMap,
) -> Result<Option<i64>, ApiError> {
    let Some(token) = parse_cookie(headers, SESSION_COOKIE) else {
        return Ok(None);
    };
    let token_hash = sha256_hex(&token);
    let user_id = call_blocking(state.app_state.db.clone(), move |db| {
        db.session_user_id(&token_hash)
    })
    .await?;
    Ok(user_id)
}

pub(super) async fn require_user(state: &WebState, headers: &HeaderMap) -> Result<i64, ApiError> {
    session_user(state, headers)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
}
