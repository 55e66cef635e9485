use serde_json::{json, Value};

use crate::api::data_of;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    api_failure, backend, optional_str, require_session, required_i64, required_role,
};
use crate::ipc::types::{AppState, Request};

fn filters_from(params: &Value) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(v) = optional_str(params, "programId") {
        query.push(("program_id", v));
    }
    if let Some(v) = optional_str(params, "status") {
        query.push(("status", v));
    }
    if let Some(v) = optional_str(params, "search") {
        query.push(("search", v));
    }
    query
}

fn list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let query = filters_from(&req.params);

    let result = backend(state, req)?.get("/batches", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let batches = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(&req.id, json!({ "batches": batches })))
}

fn create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch = req
        .params
        .get("batch")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing batch", None))?;

    let result = backend(state, req)?.post("/batches", &batch, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let message = body.get("message").and_then(|v| v.as_str()).map(str::to_string);
    Ok(ok(
        &req.id,
        json!({ "batch": data_of(body), "message": message }),
    ))
}

fn update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;
    let patch = req
        .params
        .get("patch")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing patch", None))?;

    let result = backend(state, req)?.put(
        &format!("/batches/{}", batch_id),
        &patch,
        Some(&cred.token),
    );
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "batch": data_of(body) })))
}

fn delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let batch_id = required_i64(req, "batchId")?;

    let result = backend(state, req)?.delete(&format!("/batches/{}", batch_id), Some(&cred.token));
    result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "deleted": true, "batchId": batch_id })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "batches.list" => list(state, req),
        "batches.create" => create(state, req),
        "batches.update" => update(state, req),
        "batches.delete" => delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
