//! Client for the multi-tenant key-value store.
//!
//! [`StoreClient`] manages databases (list, create, delete, open);
//! [`StoreDatabase`] presents one database as a key → JSON value mapping.

mod database;
mod session;

pub use database::StoreDatabase;

use crate::config::{RetryConfig, StoreConfig};
use crate::utils::errors::{IndexerError, Result};
use reqwest::Method;
use session::Session;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct StoreClient {
    session: Arc<Session>,
}

impl StoreClient {
    pub fn new(store: &StoreConfig, retry: &RetryConfig) -> Result<Self> {
        Ok(Self {
            session: Arc::new(Session::new(store, retry)?),
        })
    }

    fn manager_url(&self, name: &str) -> String {
        self.session.url(&format!("manager/{name}"))
    }

    /// Names of all databases of this tenant.
    pub async fn list(&self) -> Result<Vec<String>> {
        let url = &self.manager_url("");
        let session = &self.session;
        session
            .with_retry("list databases", move || async move {
                let response = session.send(Method::OPTIONS, url).await?;
                Ok(response.json::<Vec<String>>().await?)
            })
            .await
    }

    /// Idempotent on the server side.
    pub async fn create(&self, name: &str) -> Result<()> {
        self.session.send(Method::POST, &self.manager_url(name)).await?;
        info!("Created database {}", name);
        Ok(())
    }

    /// Removes the database and all its entries. `NotFound` if absent.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.session.send(Method::DELETE, &self.manager_url(name)).await?;
        info!("Deleted database {}", name);
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list().await?.iter().any(|n| n == name))
    }

    /// Open a handle on `name`, creating the database first if needed.
    pub async fn open(&self, name: &str) -> Result<StoreDatabase> {
        if !self.exists(name).await? {
            self.create(name).await?;
        }
        Ok(StoreDatabase::new(Arc::clone(&self.session), name))
    }

    /// Open a handle on an existing database. `NotFound` if absent.
    pub async fn attach(&self, name: &str) -> Result<StoreDatabase> {
        if !self.exists(name).await? {
            return Err(IndexerError::NotFound(format!("database {name}")));
        }
        Ok(StoreDatabase::new(Arc::clone(&self.session), name))
    }
}
