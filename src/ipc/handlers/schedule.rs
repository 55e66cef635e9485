use chrono::{Local, NaiveDate};
use log::warn;
use serde_json::{json, Value};

use crate::api::Batch;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{api_failure, backend, optional_str, require_session, required_role};
use crate::ipc::types::{AppState, Request};
use crate::sched;

/// windowStart/windowEnd come as a pair or not at all; a lone bound is a
/// caller bug worth rejecting loudly.
fn parse_window(req: &Request) -> Result<Option<(NaiveDate, NaiveDate)>, Value> {
    let start = optional_str(&req.params, "windowStart");
    let end = optional_str(&req.params, "windowEnd");
    match (start, end) {
        (None, None) => Ok(None),
        (Some(s), Some(e)) => {
            let s = sched::parse_date(&s).ok_or_else(|| {
                err(&req.id, "bad_params", "windowStart must be YYYY-MM-DD", None)
            })?;
            let e = sched::parse_date(&e).ok_or_else(|| {
                err(&req.id, "bad_params", "windowEnd must be YYYY-MM-DD", None)
            })?;
            Ok(Some((s, e)))
        }
        _ => Err(err(
            &req.id,
            "bad_params",
            "windowStart and windowEnd must be given together",
            None,
        )),
    }
}

/// Status derivation depends on "today"; an explicit override keeps
/// recomputation deterministic for the shell and for tests.
fn parse_today(req: &Request) -> Result<NaiveDate, Value> {
    match optional_str(&req.params, "today") {
        Some(s) => sched::parse_date(&s)
            .ok_or_else(|| err(&req.id, "bad_params", "today must be YYYY-MM-DD", None)),
        None => Ok(Local::now().date_naive()),
    }
}

fn sessions(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = required_role(req)?;
    let cred = require_session(state, req, role)?;
    let window = parse_window(req)?;
    let today = parse_today(req)?;

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(v) = optional_str(&req.params, "programId") {
        query.push(("program_id", v));
    }
    if let Some(v) = optional_str(&req.params, "status") {
        query.push(("status", v));
    }

    let result = backend(state, req)?.get("/batches", &query, Some(&cred.token));
    let body = result.map_err(|e| api_failure(state, &req.id, role, e))?;

    let rows = body
        .get("data")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let mut skipped = 0usize;
    let mut sessions = Vec::new();
    for row in rows {
        match serde_json::from_value::<Batch>(row) {
            Ok(batch) => sessions.extend(sched::expand_sessions(&batch, window, today)),
            Err(e) => {
                skipped += 1;
                warn!("unreadable batch in /batches payload: {}", e);
            }
        }
    }
    sessions.sort_by(|a, b| (a.date, a.time_start).cmp(&(b.date, b.time_start)));

    let out: Vec<Value> = sessions.iter().map(|s| s.to_json()).collect();
    Ok(ok(
        &req.id,
        json!({
            "today": today.format("%Y-%m-%d").to_string(),
            "count": out.len(),
            "skippedBatches": skipped,
            "sessions": out
        }),
    ))
}

/// Pure local expansion of one batch record the shell already holds, so
/// calendar views can recompute without refetching.
fn expand_batch(req: &Request) -> Result<Value, Value> {
    let raw = req
        .params
        .get("batch")
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing batch", None))?;
    let batch: Batch = serde_json::from_value(raw)
        .map_err(|e| err(&req.id, "bad_params", format!("batch: {}", e), None))?;
    let window = parse_window(req)?;
    let today = parse_today(req)?;

    let sessions = sched::expand_sessions(&batch, window, today);
    let out: Vec<Value> = sessions.iter().map(|s| s.to_json()).collect();
    Ok(ok(
        &req.id,
        json!({ "count": out.len(), "sessions": out }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "schedule.sessions" => sessions(state, req),
        "schedule.expandBatch" => expand_batch(req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
