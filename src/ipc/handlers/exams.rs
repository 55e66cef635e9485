use serde_json::{json, Value};

use crate::api::data_of;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    api_failure, backend, optional_str, require_session, required_i64, required_role,
};
use crate::ipc::types::{AppState, Request};

fn list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(v) = optional_str(&req.params, "batchId") {
        query.push(("batch_id", v));
    }

    let result = backend(state, req)?.get("/exams", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let exams = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(&req.id, json!({ "exams": exams })))
}

fn create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let exam = req
        .params
        .get("exam")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing exam", None))?;

    let result = backend(state, req)?.post("/exams", &exam, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "exam": data_of(body) })))
}

fn update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let exam_id = required_i64(req, "examId")?;
    let patch = req
        .params
        .get("patch")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing patch", None))?;

    let result =
        backend(state, req)?.put(&format!("/exams/{}", exam_id), &patch, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "exam": data_of(body) })))
}

fn delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let exam_id = required_i64(req, "examId")?;

    let result = backend(state, req)?.delete(&format!("/exams/{}", exam_id), Some(&cred.token));
    result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "deleted": true, "examId": exam_id })))
}

fn results(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let exam_id = required_i64(req, "examId")?;

    let result = backend(state, req)?.get(
        &format!("/exams/{}/results", exam_id),
        &[],
        Some(&cred.token),
    );
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let results = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(&req.id, json!({ "examId": exam_id, "results": results })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "exams.list" => list(state, req),
        "exams.create" => create(state, req),
        "exams.update" => update(state, req),
        "exams.delete" => delete(state, req),
        "exams.results" => results(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
