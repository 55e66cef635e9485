use std::path::PathBuf;

use log::info;
use serde_json::json;

use crate::api::Backend;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::session::SqliteStore;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backendUrl": state.backend.as_ref().map(|b| b.base_url().to_string()),
            "profilePath": state.profile.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_profile_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match SqliteStore::open(&path) {
        Ok(store) => {
            state.sessions.attach_persistent(store);
            state.profile = Some(path.clone());
            info!("profile selected at {}", path.to_string_lossy());
            ok(&req.id, json!({ "profilePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "store_open_failed", format!("{e:?}"), None),
    }
}

fn handle_backend_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    let url = match req.params.get("baseUrl").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing baseUrl", None),
    };
    if url.is_empty() {
        return err(&req.id, "bad_params", "baseUrl must not be empty", None);
    }

    match Backend::new(&url) {
        Ok(backend) => {
            info!("backend configured at {}", backend.base_url());
            let base = backend.base_url().to_string();
            state.backend = Some(backend);
            ok(&req.id, json!({ "backendUrl": base }))
        }
        Err(e) => err(&req.id, "backend_init_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "profile.select" => Some(handle_profile_select(state, req)),
        "backend.configure" => Some(handle_backend_configure(state, req)),
        _ => None,
    }
}
