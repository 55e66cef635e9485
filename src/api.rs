use std::collections::BTreeMap;
use std::time::Duration;

use log::warn;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

const REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the bearer token (HTTP 401).
    #[error("session is no longer valid")]
    Unauthorized,
    /// The backend returned a field-by-field validation map.
    #[error("{message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    /// The backend said no without field errors. Covers both HTTP error
    /// statuses and `success: false` on a 200, which the protocol treats
    /// identically.
    #[error("{0}")]
    Rejected(String),
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("unexpected backend response: {0}")]
    Protocol(String),
}

/// One training cohort as the backend serializes it. Schedule fields stay
/// as wire strings; `sched` parses them and degrades missing or malformed
/// values to an empty expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub batch_id: String,
    #[serde(default)]
    pub program: Option<ProgramRef>,
    #[serde(default)]
    pub trainer: Option<TrainerRef>,
    #[serde(default)]
    pub schedule_days: Vec<String>,
    #[serde(default)]
    pub schedule_time_start: Option<String>,
    #[serde(default)]
    pub schedule_time_end: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub max_students: Option<i64>,
    #[serde(default)]
    pub enrolled_students_count: Option<i64>,
    /// Coarse batch-level lifecycle, used for list filtering only. Session
    /// status is always derived from dates, never from this field.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainerRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

pub struct LoginSuccess {
    pub token: String,
    pub user: Value,
}

pub struct Backend {
    http: Client,
    base_url: String,
}

impl Backend {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /{role}/login`. Admin, staff and trainer logins return
    /// `token`/`user` at the top level; the applicant flow nests them
    /// under `data`. Both shapes are accepted here.
    pub fn login(&self, role: &str, email: &str, password: &str) -> Result<LoginSuccess, ApiError> {
        let body = self.post(
            &format!("/{}/login", role),
            &json!({ "email": email, "password": password }),
            None,
        )?;
        let scope = if body.get("token").is_some() {
            &body
        } else {
            body.get("data").unwrap_or(&body)
        };
        let token = scope
            .get("token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Protocol("login response missing token".to_string()))?
            .to_string();
        let user = scope
            .get("user")
            .filter(|u| u.is_object())
            .cloned()
            .ok_or_else(|| ApiError::Protocol("login response missing user".to_string()))?;
        Ok(LoginSuccess { token, user })
    }

    pub fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.send(self.http.get(self.url(path)).query(query), token)
    }

    pub fn post(&self, path: &str, body: &Value, token: Option<&str>) -> Result<Value, ApiError> {
        self.send(self.http.post(self.url(path)).json(body), token)
    }

    pub fn put(&self, path: &str, body: &Value, token: Option<&str>) -> Result<Value, ApiError> {
        self.send(self.http.put(self.url(path)).json(body), token)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        self.send(self.http.delete(self.url(path)), token)
    }

    /// Fetches a raw file body (certificate downloads). No envelope.
    pub fn download(&self, path: &str, token: Option<&str>) -> Result<Vec<u8>, ApiError> {
        let resp = self
            .decorate(self.http.get(self.url(path)), token)
            .send()
            .map_err(|e| {
                warn!("backend request failed: {}", e);
                ApiError::Network(e.to_string())
            })?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Rejected(format!(
                "download failed with status {}",
                status.as_u16()
            )));
        }
        let bytes = resp
            .bytes()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn decorate(&self, rb: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let rb = rb
            .header("Accept", "application/json")
            .header("X-Request-Id", Uuid::new_v4().to_string());
        match token {
            Some(t) => rb.bearer_auth(t),
            None => rb,
        }
    }

    fn send(&self, rb: RequestBuilder, token: Option<&str>) -> Result<Value, ApiError> {
        let resp = self.decorate(rb, token).send().map_err(|e| {
            warn!("backend request failed: {}", e);
            ApiError::Network(e.to_string())
        })?;
        decode_envelope(resp)
    }
}

/// Decodes `{ success, data?, message?, errors? }` and folds the two
/// failure channels (HTTP status and falsy `success`) into one.
fn decode_envelope(resp: Response) -> Result<Value, ApiError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body: Value = resp
        .json()
        .map_err(|e| ApiError::Protocol(format!("body is not JSON: {}", e)))?;

    let success = body.get("success").and_then(|v| v.as_bool());
    let failed = !status.is_success() || success == Some(false);
    if !failed {
        return Ok(body);
    }

    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    if let Some(errors) = parse_field_errors(body.get("errors")) {
        return Err(ApiError::Validation { message, errors });
    }
    Err(ApiError::Rejected(message))
}

fn parse_field_errors(raw: Option<&Value>) -> Option<BTreeMap<String, Vec<String>>> {
    let obj = raw?.as_object()?;
    let mut out = BTreeMap::new();
    for (field, messages) in obj {
        let list = match messages {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(|m| m.as_str().map(|s| s.to_string()))
                .collect(),
            _ => continue,
        };
        if !list.is_empty() {
            out.insert(field.clone(), list);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Pulls `data` out of a decoded envelope, tolerating endpoints that
/// return the payload at the top level.
pub fn data_of(body: Value) -> Value {
    match body {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Object(map)),
        other => other,
    }
}
