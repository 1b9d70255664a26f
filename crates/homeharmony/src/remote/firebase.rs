//! Firebase Realtime Database backend, via its REST interface.

use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use tracing::debug;

use super::RemoteError;
use super::RemoteStore;
use super::RemoteStoreContext;
use super::RemoteStoreFactoryResult;
use super::REGISTRY;
use crate::config::FirebaseConfig;

#[distributed_slice(REGISTRY)]
fn init_firebase(ctx: &RemoteStoreContext) -> RemoteStoreFactoryResult {
    let Some(config) = &ctx.config.store.firebase else {
        return Ok(None);
    };

    if !config.database_url.starts_with("https://") && !config.database_url.starts_with("http://") {
        anyhow::bail!(
            "store.firebase.database_url must be an http(s) URL, got '{}'",
            config.database_url
        );
    }

    Ok(Some(Arc::new(FirebaseStore::new(config))))
}

pub struct FirebaseStore {
    client: reqwest::Client,
    database_url: String,
    auth: Option<String>,
}

impl FirebaseStore {
    pub fn new(config: &FirebaseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            database_url: config.database_url.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
        }
    }

    /// REST URL for a database path: `{database_url}{path}.json`
    fn url_for(&self, path: &str) -> String {
        format!("{}/{}.json", self.database_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url_for(path));
        match &self.auth {
            Some(auth) => builder.query(&[("auth", auth)]),
            None => builder,
        }
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    fn name(&self) -> &str {
        "firebase"
    }

    async fn write(&self, path: &str, value: bool) -> Result<(), RemoteError> {
        debug!("PUT {} = {}", path, value);

        let response = self
            .request(reqwest::Method::PUT, path)
            .json(&value)
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                path: path.to_string(),
                status,
                body,
            });
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<bool>, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                path: path.to_string(),
                status,
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        parse_value(path, value)
    }

    fn supports_read(&self) -> bool {
        true
    }
}

/// Firebase returns `null` for paths that were never written.
fn parse_value(path: &str, value: serde_json::Value) -> Result<Option<bool>, RemoteError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Bool(b) => Ok(Some(b)),
        other => Err(RemoteError::UnexpectedValue {
            path: path.to_string(),
            value: other.to_string(),
        }),
    }
}
