use std::path::PathBuf;

use serde::Deserialize;

use crate::api::Backend;
use crate::session::SessionManager;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub profile: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new() -> Self {
        // The shell normally issues backend.configure on startup; the env
        // var covers headless runs.
        let backend = std::env::var("TRACKED_API_URL")
            .ok()
            .and_then(|url| Backend::new(&url).ok());
        Self {
            profile: None,
            backend,
            sessions: SessionManager::new(),
        }
    }
}
