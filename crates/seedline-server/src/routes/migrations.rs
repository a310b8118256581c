//! `POST /run-migrations` and `GET /migrations-state`.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use seedline_core::{RunOutcome, RunRequest};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::middleware::Principal;
use crate::server::AppState;

/// Loose truthiness for the `takeover` flag: `true`, non-zero numbers,
/// non-empty strings and any array or object.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Reads run options field by field; a missing or malformed body means
/// defaults, and one bad field never discards the other.
fn parse_run_request(body: &[u8]) -> RunRequest {
    if body.iter().all(u8::is_ascii_whitespace) {
        return RunRequest::default();
    }
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Ignoring malformed run options");
            return RunRequest::default();
        }
    };

    let takeover = parsed.get("takeover").is_some_and(truthy);
    let rerun_ids = match parsed.get("rerunIds") {
        Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_i64).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            debug!(rerun_ids = %other, "Ignoring non-array rerunIds");
            Vec::new()
        }
    };

    RunRequest {
        takeover,
        rerun_ids,
    }
}

pub async fn run_migrations(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_run_request(&body);
    let caller = principal.map(|Extension(p)| p.subject);
    info!(
        caller = caller.as_deref().unwrap_or("unknown"),
        takeover = request.takeover,
        rerun_ids = ?request.rerun_ids,
        "Run requested"
    );

    match state.service.run(request).await {
        Ok(RunOutcome::Completed(report)) => Ok(Json(report).into_response()),
        Ok(RunOutcome::Locked { takeover_requested }) => {
            Err(ApiError::Locked { takeover_requested })
        }
        Err(e) => {
            warn!(error = %e, "Migration run failed");
            Err(ApiError::run_failed(e))
        }
    }
}

pub async fn migrations_state(State(state): State<AppState>) -> Result<Response, ApiError> {
    let snapshot = state.service.state().await.map_err(|e| {
        warn!(error = %e, "State scan failed");
        ApiError::scan_failed(e)
    })?;
    debug!(
        count = snapshot.migrations.len(),
        has_lock = snapshot.lock.is_some(),
        "State listed"
    );
    Ok(Json(snapshot).into_response())
}
