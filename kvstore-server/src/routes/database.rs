use crate::auth::AccessContext;
use crate::error::AppError;
use crate::routes::{decode_body, run_store};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{options, MethodRouter};
use axum::{Extension, Json, Router};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

fn entry_routes() -> MethodRouter<Arc<AppState>> {
    options(list_keys)
        .get(get_entry)
        .put(append_entry)
        .post(set_entry)
        .delete(delete_entry)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/database/{name}", entry_routes())
        .route("/database/{name}/", entry_routes())
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    let keys = run_store("list_keys", &ctx, Some(name.as_str()), move || {
        state.store.open(&tenant, &db)?.list_keys()
    })
    .await?;
    Ok(Json(keys))
}

async fn get_entry(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let key: String = decode_body("get", &ctx, &body)?;
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    let value = run_store("get", &ctx, Some(name.as_str()), move || {
        state.store.open(&tenant, &db)?.get(&key)
    })
    .await?;
    Ok(Json(value))
}

/// Union-append: replace only if the submitted list differs from the stored one.
async fn append_entry(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let (key, value): (String, Value) = decode_body("union_append", &ctx, &body)?;
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    let written = run_store("union_append", &ctx, Some(name.as_str()), move || {
        state.store.open(&tenant, &db)?.union_append(&key, &value)
    })
    .await?;
    tracing::trace!(database = %name, written, "union_append");
    Ok(StatusCode::NO_CONTENT)
}

async fn set_entry(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let (key, value): (String, Value) = decode_body("set", &ctx, &body)?;
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    run_store("set", &ctx, Some(name.as_str()), move || {
        state.store.open(&tenant, &db)?.set(&key, &value)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let key: String = decode_body("delete", &ctx, &body)?;
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    run_store("delete", &ctx, Some(name.as_str()), move || {
        state.store.open(&tenant, &db)?.delete(&key)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_helpers::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_overwrite_round_trip() {
        let (app, _state, _tmp) = setup_app();
        call(&app, "POST", "/manager/d", ADMIN_KEY, None).await;

        let value = json!({"basename": "h_t_2017-01-01T00:00:00", "sizes": [1, 2, 3]});
        call(&app, "POST", "/database/d", ADMIN_KEY, Some(json!(["k", value.clone()]))).await;
        let (_, body) = call(&app, "GET", "/database/d", READ_KEY, Some(json!("k"))).await;
        assert_eq!(json(&body), value);

        call(&app, "POST", "/database/d", ADMIN_KEY, Some(json!(["k", "other"]))).await;
        let (_, body) = call(&app, "GET", "/database/d", READ_KEY, Some(json!("k"))).await;
        assert_eq!(json(&body), json!("other"));
    }

    #[tokio::test]
    async fn test_union_append_same_value_is_noop() {
        let (app, state, _tmp) = setup_app();
        call(&app, "POST", "/manager/d", ADMIN_KEY, None).await;

        for _ in 0..2 {
            let (status, _) =
                call(&app, "PUT", "/database/d/", ADMIN_KEY, Some(json!(["k", ["a"]]))).await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        let db = state.store.open(TENANT, "d").unwrap();
        assert!(!db.union_append("k", &json!(["a"])).unwrap());
        assert_eq!(db.get("k").unwrap(), json!(["a"]));
    }

    #[tokio::test]
    async fn test_delete_missing_key_leaves_state() {
        let (app, _state, _tmp) = setup_app();
        call(&app, "POST", "/manager/d", ADMIN_KEY, None).await;
        call(&app, "POST", "/database/d/", ADMIN_KEY, Some(json!(["a", 1]))).await;

        let (status, _) = call(&app, "DELETE", "/database/d/", ADMIN_KEY, Some(json!("b"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = call(&app, "OPTIONS", "/database/d/", ADMIN_KEY, None).await;
        assert_eq!(json(&body), json!(["a"]));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (app, _state, _tmp) = setup_app();
        call(&app, "POST", "/manager/d", ADMIN_KEY, None).await;
        let (status, _) =
            call(&app, "POST", "/database/d/", ADMIN_KEY, Some(json!({"key": "k"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
