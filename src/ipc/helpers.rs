use serde_json::Value;

use crate::api::{ApiError, Backend};
use crate::ipc::error::{err, err_api};
use crate::ipc::types::{AppState, Request};
use crate::session::{Credential, Role};

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Entity ids arrive as JSON numbers from the backend but shells have a
/// habit of echoing them back as strings; accept both.
pub fn required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    let parsed = match req.params.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_role(req: &Request) -> Result<Role, Value> {
    let raw = required_str(req, "role")?;
    Role::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown role: {}", raw),
            None,
        )
    })
}

pub fn backend<'a>(state: &'a AppState, req: &Request) -> Result<&'a Backend, Value> {
    state
        .backend
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_backend", "configure a backend first", None))
}

/// Route-entry guard: runs before any backend call so an unauthenticated
/// request does no work beyond the local check.
pub fn require_session(
    state: &mut AppState,
    req: &Request,
    role: Role,
) -> Result<Credential, Value> {
    state.sessions.credential(role).ok_or_else(|| {
        err(
            &req.id,
            "unauthenticated",
            format!("log in as {} first", role.as_str()),
            None,
        )
    })
}

/// A 401 means the stored token is stale; drop the credential before
/// surfacing the failure so the next guard check sends the shell back to
/// the login view.
pub fn api_failure(state: &mut AppState, req_id: &str, role: Role, e: ApiError) -> Value {
    if matches!(e, ApiError::Unauthorized) {
        let _ = state.sessions.logout(role);
    }
    err_api(req_id, e)
}
