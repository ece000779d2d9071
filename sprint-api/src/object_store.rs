//! HTTP object storage client
//!
//! Talks to a bucket-style endpoint: `PUT {base}/{name}` stores an object,
//! `DELETE {base}/{name}` removes it. The object name doubles as the handle.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sprint_core::ObjectStoreError;
use sprint_storage::{ObjectStore, StoredObject};
use std::time::Duration;

/// Optional body returned by the storage endpoint after an upload.
#[derive(Debug, Deserialize)]
struct PutResponse {
    url: Option<String>,
}

/// [`ObjectStore`] backed by an HTTP bucket endpoint.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ObjectStoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObjectStoreError::Unavailable {
                reason: format!("HTTP client setup failed: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, ObjectStoreError> {
        let url = self.object_url(name);
        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Unavailable {
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::UploadFailed {
                reason: format!("{}: {}", status, body),
            });
        }

        // Endpoints that front a CDN report the public URL; others serve
        // the object where it was written.
        let public_url = response
            .json::<PutResponse>()
            .await
            .ok()
            .and_then(|r| r.url)
            .unwrap_or(url);

        tracing::debug!(name, url = %public_url, "Object stored");
        Ok(StoredObject {
            handle: name.to_string(),
            url: public_url,
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .authorize(self.client.delete(self.object_url(handle)))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Unavailable {
                reason: format!("HTTP request failed: {}", e),
            })?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(handle, "Object already absent");
                Ok(())
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(ObjectStoreError::DeleteFailed {
                    handle: handle.to_string(),
                    reason: format!("{}: {}", s, body),
                })
            }
        }
    }
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_strips_trailing_slash() {
        let store =
            HttpObjectStore::new("https://cdn.example/bucket/", None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            store.object_url("1700000000000-ab12.png"),
            "https://cdn.example/bucket/1700000000000-ab12.png"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let store = HttpObjectStore::new(
            "https://cdn.example",
            Some("secret".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let debug = format!("{:?}", store);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let store =
            HttpObjectStore::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
        let err = store.delete("missing").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::Unavailable { .. }));
    }
}
