//! REST client over `reqwest`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connect/cleanup hooks for HTTP APIs
#[derive(Debug, Clone, Copy, Default)]
pub struct RestService;

/// A REST client managed by the lifecycle state machine
pub type RestClient = ManagedClient<RestService>;

#[derive(Debug, Clone)]
pub struct RestHandle {
    http: reqwest::Client,
    base_url: Url,
}

impl RestHandle {
    /// Resolve a request path against the base URL
    ///
    /// Absolute URLs pass through untouched.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::service(ClientKind::Rest, format!("invalid path '{path}': {e}")))
    }
}

/// Response captured in full so steps can assert on it freely
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[async_trait]
impl Service for RestService {
    type Handle = RestHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Rest
    }

    async fn initialize_client(
        &self,
        client: &ClientDescriptor,
        config: &ClientConfig,
    ) -> Result<RestHandle> {
        let raw: String = config.require(client.name(), "base_url")?;
        // A trailing slash keeps the last path segment when joining
        let normalized = if raw.ends_with('/') {
            raw
        } else {
            format!("{raw}/")
        };
        let base_url = Url::parse(&normalized).map_err(|e| Error::config_value("base_url", e))?;

        let timeout = config.get_or("timeout_secs", DEFAULT_TIMEOUT_SECS)?;
        let headers = default_headers(
            &config.get_or("headers", HashMap::<String, String>::new())?,
            config.get::<String>("bearer_token")?.as_deref(),
        )?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::service(ClientKind::Rest, e))?;

        tracing::debug!(base_url = %base_url, "REST client ready");
        Ok(RestHandle { http, base_url })
    }
}

fn default_headers(headers: &HashMap<String, String>, bearer: Option<&str>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config_value("headers", format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::config_value("headers", format!("{name}: {e}")))?;
        map.insert(name, value);
    }
    if let Some(token) = bearer {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::config_value("bearer_token", e))?;
        value.set_sensitive(true);
        map.insert(AUTHORIZATION, value);
    }
    Ok(map)
}

impl ManagedClient<RestService> {
    /// Send a request, optionally with a JSON body
    #[tracing::instrument(skip(self, body), fields(client = %self.descriptor().name()))]
    pub async fn request<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<RestResponse> {
        let handle = self.handle().await?;
        let url = handle.resolve(path)?;

        let mut request = handle.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Rest, e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::service(ClientKind::Rest, e))?
            .to_vec();

        tracing::debug!(status, bytes = body.len(), "response received");
        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, path: &str) -> Result<RestResponse> {
        self.request::<()>(Method::GET, path, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<RestResponse> {
        self.request::<()>(Method::DELETE, path, None).await
    }

    pub async fn post_json<B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> Result<RestResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> Result<RestResponse> {
        self.request(Method::PUT, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(config: ClientConfig) -> RestClient {
        ManagedClient::new("api", config, RestService)
    }

    /// Serve a single canned response and hand back the raw request
    async fn one_shot_server(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}/v1"), task)
    }

    #[tokio::test]
    async fn test_base_url_is_required() {
        let err = client(ClientConfig::new()).init().await.unwrap_err();
        assert!(matches!(err, Error::MissingConfig { .. }));
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_rejected() {
        let rest = client(ClientConfig::new().with("base_url", "not a url"));
        let err = rest.init().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!rest.is_initialized());
    }

    #[tokio::test]
    async fn test_requests_need_initialization() {
        let rest = client(ClientConfig::new().with("base_url", "http://localhost"));
        assert!(matches!(
            rest.get("/health").await,
            Err(Error::NotInitialized { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_keeps_base_path() {
        let rest = client(ClientConfig::new().with("base_url", "http://localhost:8080/api/v2"));
        rest.init().await.unwrap();
        let handle = rest.handle().await.unwrap();
        assert_eq!(
            handle.resolve("/orders/7").unwrap().as_str(),
            "http://localhost:8080/api/v2/orders/7"
        );
        assert_eq!(
            handle.resolve("https://other.test/x").unwrap().as_str(),
            "https://other.test/x"
        );
    }

    #[tokio::test]
    async fn test_get_against_local_server() {
        let (base_url, server) = one_shot_server(r#"{"status":"ok"}"#).await;
        let rest = client(
            ClientConfig::new()
                .with("base_url", base_url)
                .with("bearer_token", "t0ken")
                .with("headers", serde_json::json!({ "x-smoke": "1" })),
        );
        rest.init().await.unwrap();

        let response = rest.get("health").await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["status"], "ok");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v1/health HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer t0ken"));
        assert!(request.contains("x-smoke: 1"));

        rest.destroy().await.unwrap();
        assert!(!rest.is_initialized());
    }
}
