use std::path::PathBuf;

use log::info;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::api::data_of;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    api_failure, backend, optional_str, require_session, required_i64, required_role, required_str,
};
use crate::ipc::types::{AppState, Request};

fn list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(v) = optional_str(&req.params, "batchId") {
        query.push(("batch_id", v));
    }

    let result = backend(state, req)?.get("/certificates", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let certificates = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(&req.id, json!({ "certificates": certificates })))
}

fn issue(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;
    let student_id = required_i64(req, "studentId")?;

    let payload = json!({ "batch_id": batch_id, "student_id": student_id });
    let result = backend(state, req)?.post("/certificates", &payload, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "certificate": data_of(body) })))
}

/// Saves the certificate file and reports its SHA-256 so the shell can
/// show a verification code next to the download.
fn download(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let certificate_id = required_i64(req, "certificateId")?;
    let out_path = PathBuf::from(required_str(req, "outPath")?);

    let result = backend(state, req)?.download(
        &format!("/certificates/{}/download", certificate_id),
        Some(&cred.token),
    );
    let bytes = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Err(err(&req.id, "io_failed", e.to_string(), None));
            }
        }
    }
    if let Err(e) = std::fs::write(&out_path, &bytes) {
        return Err(err(&req.id, "io_failed", e.to_string(), None));
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = format!("{:x}", hasher.finalize());
    info!(
        "certificate {} saved to {} ({} bytes)",
        certificate_id,
        out_path.to_string_lossy(),
        bytes.len()
    );
    Ok(ok(
        &req.id,
        json!({
            "certificateId": certificate_id,
            "outPath": out_path.to_string_lossy(),
            "bytes": bytes.len(),
            "sha256": sha256,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "certificates.list" => list(state, req),
        "certificates.issue" => issue(state, req),
        "certificates.download" => download(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
