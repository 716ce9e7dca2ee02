use crate::auth::AccessContext;
use crate::error::AppError;
use crate::routes::run_store;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{options, post};
use axum::{Extension, Json, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/manager", options(list_databases))
        .route("/manager/", options(list_databases))
        .route(
            "/manager/{name}",
            post(create_database).head(database_exists).delete(delete_database),
        )
        .route(
            "/manager/{name}/",
            post(create_database).head(database_exists).delete(delete_database),
        )
}

async fn list_databases(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
) -> Result<Json<Vec<String>>, AppError> {
    let tenant = ctx.tenant.clone();
    let names = run_store("list_databases", &ctx, None, move || {
        state.store.list_databases(&tenant)
    })
    .await?;
    Ok(Json(names))
}

async fn create_database(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
) -> Result<Json<String>, AppError> {
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    run_store("create_database", &ctx, Some(name.as_str()), move || {
        state.store.create_database(&tenant, &db)
    })
    .await?;
    Ok(Json(name))
}

async fn database_exists(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    let exists = run_store("database_exists", &ctx, Some(name.as_str()), move || {
        state.store.database_exists(&tenant, &db)
    })
    .await?;
    if exists {
        Ok(StatusCode::OK)
    } else {
        Err(AppError::NotFound(format!("database {name} not found")))
    }
}

async fn delete_database(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let (tenant, db) = (ctx.tenant.clone(), name.clone());
    run_store("delete_database", &ctx, Some(name.as_str()), move || {
        state.store.delete_database(&tenant, &db)
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
    async fn test_create_twice_lists_once() {
        let (app, _state, _tmp) = setup_app();
        for _ in 0..2 {
            let (status, _) = call(&app, "POST", "/manager/d", ADMIN_KEY, None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = call(&app, "OPTIONS", "/manager/", ADMIN_KEY, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), json!(["d"]));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let (app, _state, _tmp) = setup_app();
        let (status, _) = call(&app, "HEAD", "/manager/d", READ_KEY, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(&app, "POST", "/manager/d", ADMIN_KEY, None).await;
        let (status, _) = call(&app, "HEAD", "/manager/d", READ_KEY, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "DELETE", "/manager/d", ADMIN_KEY, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "DELETE", "/manager/d", ADMIN_KEY, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = call(&app, "OPTIONS", "/manager", ADMIN_KEY, None).await;
        assert_eq!(json(&body), json!([]));
    }

    #[tokio::test]
    async fn test_entry_ops_on_missing_database() {
        let (app, _state, _tmp) = setup_app();
        let (status, _) = call(&app, "OPTIONS", "/database/nope/", ADMIN_KEY, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
