use serde_json::{json, Value};

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
    if let Some(v) = optional_str(&req.params, "audience") {
        query.push(("audience", v));
    }

    let result = backend(state, req)?.get("/announcements", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let announcements = body.get("data").cloned().unwrap_or_else(|| json!([]));
    Ok(ok(&req.id, json!({ "announcements": announcements })))
}

fn create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let title = required_str(req, "title")?;
    let body_text = required_str(req, "body")?;
    let mut payload = json!({ "title": title, "body": body_text });
    if let Some(audience) = optional_str(&req.params, "audience") {
        payload["audience"] = json!(audience);
    }

    let result = backend(state, req)?.post("/announcements", &payload, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "announcement": data_of(body) })))
}

fn update(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let announcement_id = required_i64(req, "announcementId")?;
    let patch = req
        .params
        .get("patch")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing patch", None))?;

    let result = backend(state, req)?.put(
        &format!("/announcements/{}", announcement_id),
        &patch,
        Some(&cred.token),
    );
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(&req.id, json!({ "announcement": data_of(body) })))
}

fn delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let announcement_id = required_i64(req, "announcementId")?;

    let result = backend(state, req)?.delete(
        &format!("/announcements/{}", announcement_id),
        Some(&cred.token),
    );
    result.map_err(|e| api_failure(state, &req.id, role, e))?;

    Ok(ok(
        &req.id,
        json!({ "deleted": true, "announcementId": announcement_id }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "announcements.list" => list(state, req),
        "announcements.create" => create(state, req),
        "announcements.update" => update(state, req),
        "announcements.delete" => delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
