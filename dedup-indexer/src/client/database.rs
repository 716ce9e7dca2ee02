use super::session::Session;
use crate::utils::errors::{IndexerError, Result};
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Handle on one remote database.
///
/// The key list is fetched on first use and cached for the life of the
/// handle. Writes through this handle keep the cache in step; writes made
/// through other handles stay invisible until [`StoreDatabase::refresh`].
pub struct StoreDatabase {
    session: Arc<Session>,
    name: String,
    url: String,
    keys: Mutex<Option<Vec<String>>>,
}

impl StoreDatabase {
    pub(crate) fn new(session: Arc<Session>, name: &str) -> Self {
        let url = session.url(&format!("database/{name}/"));
        debug!("Opened handle on database {}", name);
        Self {
            session,
            name: name.to_string(),
            url,
            keys: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All keys, from the handle's cache when populated.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut cache = self.keys.lock().await;
        if let Some(keys) = cache.as_ref() {
            return Ok(keys.clone());
        }
        let (session, url) = (&self.session, &self.url);
        let keys = session
            .with_retry("list keys", move || async move {
                let response = session.send(Method::OPTIONS, url).await?;
                Ok(response.json::<Vec<String>>().await?)
            })
            .await?;
        *cache = Some(keys.clone());
        Ok(keys)
    }

    /// Drop the cached key list; the next `keys()` asks the server again.
    pub async fn refresh(&self) {
        *self.keys.lock().await = None;
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.keys().await?.iter().any(|k| k == key))
    }

    /// Fetch a value. A missing key is [`IndexerError::NotFound`].
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let (session, url) = (&self.session, &self.url);
        session
            .with_retry("get", move || async move {
                let response = session.send_json(Method::GET, url, key).await?;
                Ok(response.json::<T>().await?)
            })
            .await
    }

    /// Like [`get`](Self::get) but maps a missing key to `None`.
    pub async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Overwrite `key` with `value`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.session
            .send_json(Method::POST, &self.url, &(key, value))
            .await?;
        self.remember(key).await;
        Ok(())
    }

    /// Union-append. The server replaces the stored list with `values` only if
    /// they differ, so `values` must already be the merged list.
    pub async fn append<T: Serialize>(&self, key: &str, values: &[T]) -> Result<()> {
        self.session
            .send_json(Method::PUT, &self.url, &(key, values))
            .await?;
        self.remember(key).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.session.send_json(Method::DELETE, &self.url, key).await?;
        if let Some(keys) = self.keys.lock().await.as_mut() {
            keys.retain(|k| k != key);
        }
        Ok(())
    }

    /// Values in key order, fetched one request per key.
    pub async fn values<T: DeserializeOwned>(
        &self,
    ) -> Result<impl Stream<Item = Result<T>> + '_> {
        let keys = self.keys().await?;
        Ok(stream::iter(keys).then(move |key| async move { self.get::<T>(&key).await }))
    }

    /// `(key, value)` pairs in key order.
    pub async fn items<T: DeserializeOwned>(
        &self,
    ) -> Result<impl Stream<Item = Result<(String, T)>> + '_> {
        let keys = self.keys().await?;
        Ok(stream::iter(keys).then(move |key| async move {
            let value = self.get::<T>(&key).await?;
            Ok::<_, IndexerError>((key, value))
        }))
    }

    async fn remember(&self, key: &str) {
        if let Some(keys) = self.keys.lock().await.as_mut() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }
}

impl Drop for StoreDatabase {
    fn drop(&mut self) {
        // The HTTP session is shared; only this handle's view goes away.
        if let Ok(mut cache) = self.keys.try_lock() {
            cache.take();
        }
        debug!("Released handle on database {}", self.name);
    }
}
