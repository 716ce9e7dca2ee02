//! Access gate: tenant + credential + verb checks against a static table.
//!
//! The table is a JSON document of the form
//! `{"<tenant>": {"<apikey>": {"methods": ["GET", ...], "role": "RW"}}}`.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

pub const TENANT_HEADER: &str = "x-idkey";
pub const CREDENTIAL_HEADER: &str = "x-apikey";

/// Shorthand verb sets.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum Role {
    R,
    RW,
    RWD,
}

impl Role {
    fn methods(self) -> &'static [&'static str] {
        match self {
            Role::R => &["HEAD", "GET", "OPTIONS"],
            Role::RW => &["HEAD", "GET", "OPTIONS", "POST", "PUT"],
            Role::RWD => &["HEAD", "GET", "OPTIONS", "POST", "PUT", "DELETE"],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCredential {
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct Credential {
    methods: HashSet<String>,
}

impl Credential {
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method.as_str())
    }
}

impl From<RawCredential> for Credential {
    fn from(raw: RawCredential) -> Self {
        let mut methods: HashSet<String> =
            raw.methods.into_iter().map(|m| m.to_ascii_uppercase()).collect();
        if let Some(role) = raw.role {
            methods.extend(role.methods().iter().map(|m| m.to_string()));
        }
        Self { methods }
    }
}

/// Why a request was turned away. Only ever logged; clients see a bare 401.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Denied {
    #[error("x-idkey header missing")]
    MissingTenant,
    #[error("x-idkey {0} is unknown")]
    UnknownTenant(String),
    #[error("x-apikey header missing")]
    MissingCredential,
    #[error("x-apikey {0} not found")]
    UnknownCredential(String),
    #[error("x-apikey {0} not allowed for method {1}")]
    MethodNotAllowed(String, String),
}

/// Identity of an authorized request, handed to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    pub tenant: String,
    pub credential: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuthTable {
    tenants: HashMap<String, HashMap<String, Credential>>,
}

impl AuthTable {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let raw: HashMap<String, HashMap<String, RawCredential>> = serde_json::from_str(text)?;
        let tenants = raw
            .into_iter()
            .map(|(tenant, creds)| {
                let creds = creds.into_iter().map(|(k, c)| (k, Credential::from(c))).collect();
                (tenant, creds)
            })
            .collect();
        Ok(Self { tenants })
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading auth table {}: {}", path.display(), e))?;
        Self::from_json(&text)
    }

    pub fn tenants(&self) -> impl Iterator<Item = &str> {
        self.tenants.keys().map(String::as_str)
    }

    pub fn authorize(
        &self,
        tenant: Option<&str>,
        credential: Option<&str>,
        method: &Method,
    ) -> Result<AccessContext, Denied> {
        let tenant = tenant.ok_or(Denied::MissingTenant)?;
        let creds = self
            .tenants
            .get(tenant)
            .ok_or_else(|| Denied::UnknownTenant(tenant.to_string()))?;
        let credential = credential.ok_or(Denied::MissingCredential)?;
        let cred = creds
            .get(credential)
            .ok_or_else(|| Denied::UnknownCredential(credential.to_string()))?;
        if !cred.allows(method) {
            return Err(Denied::MethodNotAllowed(
                credential.to_string(),
                method.to_string(),
            ));
        }
        Ok(AccessContext {
            tenant: tenant.to_string(),
            credential: credential.to_string(),
        })
    }
}

fn header<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Authenticate stage of the middleware chain. Short-circuits with 401.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let decision = state.auth.authorize(
        header(&req, TENANT_HEADER),
        header(&req, CREDENTIAL_HEADER),
        req.method(),
    );

    match decision {
        Ok(ctx) => {
            tracing::debug!(tenant = %ctx.tenant, method = %req.method(), "Authorized");
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(reason) => {
            tracing::warn!(method = %req.method(), uri = %req.uri(), "Rejected: {}", reason);
            AppError::Unauthorized.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "acme": {
            "reader": {"role": "R"},
            "writer": {"methods": ["get", "OPTIONS", "POST", "PUT"]},
            "admin": {"role": "RW", "methods": ["DELETE"]}
        }
    }"#;

    #[test]
    fn test_authorize_success_exposes_context() {
        let table = AuthTable::from_json(TABLE).unwrap();
        let ctx = table.authorize(Some("acme"), Some("writer"), &Method::GET).unwrap();
        assert_eq!(
            ctx,
            AccessContext { tenant: "acme".into(), credential: "writer".into() }
        );
    }

    #[test]
    fn test_authorize_rejections() {
        let table = AuthTable::from_json(TABLE).unwrap();
        assert_eq!(
            table.authorize(None, Some("writer"), &Method::GET),
            Err(Denied::MissingTenant)
        );
        assert_eq!(
            table.authorize(Some("globex"), Some("writer"), &Method::GET),
            Err(Denied::UnknownTenant("globex".into()))
        );
        assert_eq!(
            table.authorize(Some("acme"), None, &Method::GET),
            Err(Denied::MissingCredential)
        );
        assert_eq!(
            table.authorize(Some("acme"), Some("nobody"), &Method::GET),
            Err(Denied::UnknownCredential("nobody".into()))
        );
        assert!(matches!(
            table.authorize(Some("acme"), Some("reader"), &Method::POST),
            Err(Denied::MethodNotAllowed(_, _))
        ));
    }

    #[test]
    fn test_roles_expand_to_verbs() {
        let table = AuthTable::from_json(TABLE).unwrap();
        for m in [Method::HEAD, Method::GET, Method::OPTIONS] {
            assert!(table.authorize(Some("acme"), Some("reader"), &m).is_ok());
        }
        assert!(table.authorize(Some("acme"), Some("writer"), &Method::DELETE).is_err());
        for m in [Method::PUT, Method::POST, Method::DELETE] {
            assert!(table.authorize(Some("acme"), Some("admin"), &m).is_ok());
        }
    }
}
