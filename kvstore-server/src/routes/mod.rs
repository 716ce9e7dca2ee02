pub mod database;
pub mod manager;

use crate::auth::{authenticate, AccessContext};
use crate::error::{AppError, StoreError};
use crate::state::AppState;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Request pipeline, outermost first:
/// trace → log-timing → authenticate → handler (dispatch + JSON encoding).
pub fn create_router(state: Arc<AppState>) -> Router {
    let authed = Router::new()
        .merge(manager::router())
        .merge(database::router())
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/health", get(health))
        .merge(authed)
        .layer(middleware::from_fn(log_timing))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn log_timing(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request finished"
    );
    response
}

/// Run a store operation on the blocking pool and translate its failure,
/// logging which operation failed for whom.
pub(crate) async fn run_store<T, F>(
    op: &'static str,
    ctx: &AccessContext,
    database: Option<&str>,
    f: F,
) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    result.map_err(|e| {
        let database = database.unwrap_or("-");
        match &e {
            StoreError::NotFound(_) | StoreError::MalformedInput(_) => {
                tracing::info!(op, tenant = %ctx.tenant, database, "{}", e)
            }
            _ => tracing::error!(op, tenant = %ctx.tenant, database, "{}", e),
        }
        AppError::from(e)
    })
}

/// Decode a JSON request body, logging and rejecting malformed input.
pub(crate) fn decode_body<T: serde::de::DeserializeOwned>(
    op: &'static str,
    ctx: &AccessContext,
    body: &[u8],
) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::info!(op, tenant = %ctx.tenant, "Malformed request body: {}", e);
        AppError::BadRequest(format!("malformed request body: {e}"))
    })
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::auth::AuthTable;
    use crate::config::AppConfig;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub const TENANT: &str = "acme";
    pub const ADMIN_KEY: &str = "admin-key";
    pub const READ_KEY: &str = "read-key";

    /// Router backed by a temp directory with one tenant and two credentials.
    pub fn setup_app() -> (Router, Arc<AppState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let auth = AuthTable::from_json(&format!(
            r#"{{"{TENANT}": {{"{ADMIN_KEY}": {{"role": "RWD"}}, "{READ_KEY}": {{"role": "R"}}}}}}"#
        ))
        .unwrap();
        let config = AppConfig {
            port: 0,
            data_dir: tmp.path().to_path_buf(),
            auth_file: tmp.path().join("auth.json"),
            log_level: "debug".into(),
            pool_size: 2,
        };
        let state = Arc::new(AppState::new(config, auth));
        state.prepare_tenants().unwrap();
        (super::create_router(state.clone()), state, tmp)
    }

    pub async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        key: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-idkey", TENANT)
            .header("x-apikey", key);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    pub fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }
}
