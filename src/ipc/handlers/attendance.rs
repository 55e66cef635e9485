use serde_json::{json, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    api_failure, backend, require_session, required_i64, required_role, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::sched;

/// Codes the attendance sheet accepts for one student on one date.
fn validate_mark_status(status: &str) -> bool {
    matches!(status, "present" | "absent" | "late" | "excused")
}

fn required_date(req: &Request) -> Result<String, Value> {
    let raw = required_str(req, "date")?;
    if sched::parse_date(&raw).is_none() {
        return Err(err(&req.id, "bad_params", "date must be YYYY-MM-DD", None));
    }
    Ok(raw)
}

fn required_status(req: &Request, raw: &Value) -> Result<String, Value> {
    let status = raw
        .get("status")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", "missing status", None))?;
    if !validate_mark_status(&status) {
        return Err(err(
            &req.id,
            "bad_params",
            "status must be one of: present, absent, late, excused",
            None,
        ));
    }
    Ok(status)
}

fn sheet(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;
    let date = required_date(req)?;

    let query = [
        ("batch_id", batch_id.to_string()),
        ("date", date.clone()),
    ];
    let result = backend(state, req)?.get("/attendance", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let rows = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(
        &req.id,
        json!({ "batchId": batch_id, "date": date, "rows": rows }),
    ))
}

fn mark(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;
    let date = required_date(req)?;
    let student_id = required_i64(req, "studentId")?;
    let status = required_status(req, &req.params)?;

    let payload = json!({
        "batch_id": batch_id,
        "date": date,
        "student_id": student_id,
        "status": status,
    });
    let result = backend(state, req)?.post("/attendance", &payload, Some(&cred.token));
    result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "marked": true })))
}

fn bulk_mark(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;
    let date = required_date(req)?;
    let raw_entries = req
        .params
        .get("entries")
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing entries", None))?;
    if raw_entries.is_empty() {
        return Err(err(&req.id, "bad_params", "entries must not be empty", None));
    }

    // Validate the whole set before sending anything so a bad row cannot
    // leave the sheet half-stamped.
    let mut entries = Vec::with_capacity(raw_entries.len());
    for raw in &raw_entries {
        let student_id = raw
            .get("studentId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| err(&req.id, "bad_params", "entry missing studentId", None))?;
        let status = required_status(req, raw)?;
        entries.push(json!({ "student_id": student_id, "status": status }));
    }

    let marked = entries.len();
    let payload = json!({
        "batch_id": batch_id,
        "date": date,
        "entries": entries,
    });
    let result = backend(state, req)?.post("/attendance/bulk", &payload, Some(&cred.token));
    result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "marked": marked })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "attendance.sheet" => sheet(state, req),
        "attendance.mark" => mark(state, req),
        "attendance.bulkMark" => bulk_mark(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
