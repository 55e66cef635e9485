use log::warn;
use serde_json::json;

use crate::api::ApiError;
use crate::ipc::error::{err, err_api, ok};
use crate::ipc::helpers::{backend, required_role, required_str};
use crate::ipc::types::{AppState, Request};

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match required_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = match backend(state, req) {
        Ok(b) => b.login(role.as_str(), &email, &password),
        Err(resp) => return resp,
    };
    let login = match result {
        Ok(v) => v,
        // A 401 from a login endpoint means bad credentials, not an
        // expired session; there is nothing to clear yet.
        Err(ApiError::Unauthorized) => {
            return err(
                &req.id,
                "invalid_credentials",
                "email or password is incorrect",
                None,
            )
        }
        Err(ApiError::Rejected(message)) => {
            return err(&req.id, "invalid_credentials", message, None)
        }
        Err(e) => return err_api(&req.id, e),
    };

    if let Err(e) = state.sessions.login(role, &login.token, &login.user) {
        warn!("credential save failed for {}: {}", role.as_str(), e);
        return err(&req.id, "store_save_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "user": login.user }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match required_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    if let Err(e) = state.sessions.logout(role) {
        return err(&req.id, "store_save_failed", e.to_string(), None);
    }
    // The shell follows up with a hard reload of the login view so no
    // in-memory state from the old session survives.
    ok(&req.id, json!({ "loggedOut": true }))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match required_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "authenticated": state.sessions.is_authenticated(role) }),
    )
}

fn handle_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match required_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match state.sessions.credential(role) {
        Some(cred) => ok(&req.id, json!({ "user": cred.user })),
        None => err(
            &req.id,
            "unauthenticated",
            format!("log in as {} first", role.as_str()),
            None,
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.status" => Some(handle_status(state, req)),
        "auth.user" => Some(handle_user(state, req)),
        _ => None,
    }
}
