use serde_json::json;

use crate::api::ApiError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps the backend client's failure taxonomy onto protocol error codes.
/// Validation maps carry the field messages through so the shell can
/// surface them inline and keep the form open.
pub fn err_api(id: &str, e: ApiError) -> serde_json::Value {
    match e {
        ApiError::Unauthorized => err(id, "session_expired", "session is no longer valid", None),
        ApiError::Validation { message, errors } => err(
            id,
            "validation_failed",
            message,
            Some(json!({ "fields": errors })),
        ),
        ApiError::Rejected(message) => err(id, "backend_rejected", message, None),
        ApiError::Network(message) => err(id, "backend_unreachable", message, None),
        ApiError::Protocol(message) => err(id, "backend_protocol", message, None),
    }
}
