//! # Firebase Realtime Database Store
//!
//! Talks to the Realtime Database REST API:
//!
//! | Operation | Request |
//! |---|---|
//! | read_subtree | `GET <url>/<path>.json?auth=<token>` |
//! | write_record | `PUT` with the JSON body |
//! | update_fields | `PATCH` with the partial object |
//! | delete_record | `DELETE` |
//!
//! The anonymous token comes from the [`IdentityProvider`]; without one the
//! call fails with a permission error instead of reaching the network.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use super::path::StorePath;
use super::traits::RecordStore;
use crate::error::StoreError;
use crate::identity::IdentityProvider;

const USER_AGENT: &str = concat!("antropometri/", env!("CARGO_PKG_VERSION"));

pub struct FirebaseStore {
    http_client: reqwest::Client,
    database_url: Url,
    identity: Arc<IdentityProvider>,
}

impl FirebaseStore {
    pub fn new(database_url: &str, identity: Arc<IdentityProvider>, timeout: Duration) -> Result<Self, StoreError> {
        let database_url = Url::parse(database_url)
            .map_err(|e| StoreError::Unknown(format!("invalid database url {:?}: {}", database_url, e)))?;
        if database_url.cannot_be_a_base() {
            return Err(StoreError::Unknown(format!("database url {} cannot be a base", database_url)));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unknown(e.to_string()))?;

        Ok(Self {
            http_client,
            database_url,
            identity,
        })
    }

    fn url_for(&self, path: &StorePath, token: &str) -> Url {
        build_url(&self.database_url, path, token)
    }

    async fn send(&self, method: Method, path: &StorePath, body: Option<Value>) -> Result<Value, StoreError> {
        let token = self
            .identity
            .current_token()
            .ok_or_else(|| StoreError::Permission("no authenticated identity".to_string()))?;

        debug!("{} {}", method, path);
        let mut request = self.http_client.request(method.clone(), self.url_for(path, &token));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} {} failed with {}: {}", method, path, status, body);
            return Err(status_error(status, body));
        }

        response.json::<Value>().await.map_err(transport_error)
    }
}

fn build_url(base: &Url, path: &StorePath, token: &str) -> Url {
    let mut url = base.clone();
    let segments = path.segments();
    if let Ok(mut url_segments) = url.path_segments_mut() {
        url_segments.pop_if_empty();
        if let Some((last, parents)) = segments.split_last() {
            url_segments.extend(parents);
            url_segments.push(&format!("{}.json", last));
        }
    }
    url.query_pairs_mut().clear().append_pair("auth", token);
    url
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        StoreError::Network(e.to_string())
    } else {
        StoreError::Unknown(e.to_string())
    }
}

fn status_error(status: StatusCode, body: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Permission(body),
        _ => StoreError::Unknown(format!("{}: {}", status.as_u16(), body)),
    }
}

#[async_trait]
impl RecordStore for FirebaseStore {
    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let value = self.send(Method::GET, path, None).await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn write_record(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.send(Method::PUT, path, Some(value)).await.map(|_| ())
    }

    async fn update_fields(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        self.send(Method::PATCH, path, Some(Value::Object(partial))).await.map(|_| ())
    }

    async fn delete_record(&self, path: &StorePath) -> Result<(), StoreError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalAnonymousBackend;

    #[test]
    fn test_build_url() {
        let base = Url::parse("https://antropometri-default-rtdb.firebaseio.com/").unwrap();
        let path = StorePath::parse("Riwayat/1719822600000").unwrap();

        let url = build_url(&base, &path, "tok en");
        assert_eq!(
            url.as_str(),
            "https://antropometri-default-rtdb.firebaseio.com/Riwayat/1719822600000.json?auth=tok+en"
        );
    }

    #[test]
    fn test_build_url_encodes_segments() {
        let base = Url::parse("http://localhost:9000/ns").unwrap();
        let path = StorePath::parse("measurements/bayi satu").unwrap();

        let url = build_url(&base, &path, "t");
        assert_eq!(url.as_str(), "http://localhost:9000/ns/measurements/bayi%20satu.json?auth=t");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "Permission denied".to_string()),
            StoreError::Permission(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            StoreError::Permission(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            StoreError::Unknown(_)
        ));
    }

    #[tokio::test]
    async fn test_calls_without_identity_fail_locally() {
        let identity = Arc::new(IdentityProvider::new(Arc::new(LocalAnonymousBackend::new())));
        let store = FirebaseStore::new("http://127.0.0.1:9", identity, Duration::from_secs(1)).unwrap();

        let result = store.read_subtree(&StorePath::history()).await;
        assert!(matches!(result, Err(StoreError::Permission(_))));
    }

    #[test]
    fn test_rejects_bad_database_url() {
        let identity = Arc::new(IdentityProvider::new(Arc::new(LocalAnonymousBackend::new())));
        assert!(FirebaseStore::new("not a url", identity, Duration::from_secs(1)).is_err());
    }
}
