use serde_json::{json, Value};

use crate::api::data_of;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{api_failure, backend, require_session, required_i64, required_role};
use crate::ipc::types::{AppState, Request};

fn list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;

    let query = [("batch_id", batch_id.to_string())];
    let result = backend(state, req)?.get("/grades", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let grades = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(&req.id, json!({ "batchId": batch_id, "grades": grades })))
}

fn record(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;
    let student_id = required_i64(req, "studentId")?;
    let exam_id = required_i64(req, "examId")?;
    let score = req
        .params
        .get("score")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", "missing score", None))?;
    if !score.is_finite() || score < 0.0 {
        return Err(err(
            &req.id,
            "bad_params",
            "score must be a non-negative number",
            None,
        ));
    }

    let payload = json!({
        "batch_id": batch_id,
        "student_id": student_id,
        "exam_id": exam_id,
        "score": score,
    });
    let result = backend(state, req)?.post("/grades", &payload, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "grade": data_of(body) })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "grades.list" => list(state, req),
        "grades.record" => record(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
