use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use storefront_cache_core::{CacheError, Request, Result, Transport, error_message};

use crate::HttpConfig;

/// `reqwest`-backed transport to the storefront REST API
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Build the transport and its connection pool
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(config.default_headers.clone());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CacheError::Configuration(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn handle(resp: Response) -> Result<Value> {
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(server_error(status, &bytes));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Decode(format!("failed to parse body: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Value> {
        let url = self.config.url_for(&request.path, &request.query)?;
        debug!(target: "storefront_cache::http", method = %request.method, url = %url, "sending request");

        let mut req = self.client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(map_reqwest_error)?;
        let result = Self::handle(resp).await;
        if let Err(err) = &result {
            warn!(target: "storefront_cache::http", method = %request.method, path = %request.path, error = %err, "request failed");
        }
        result
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout
    } else if err.is_decode() {
        CacheError::Decode(err.to_string())
    } else {
        CacheError::Network(err.to_string())
    }
}

/// Map a non-2xx response to a server error, preferring the envelope message
fn server_error(status: StatusCode, body: &[u8]) -> CacheError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| error_message(&v))
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                text
            }
        });
    CacheError::server(status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the base URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/api")
    }

    #[test]
    fn test_server_error_uses_envelope_message() {
        let err = server_error(
            StatusCode::NOT_FOUND,
            br#"{"results":null,"message":"brand not found","statusCode":404}"#,
        );
        assert_eq!(err, CacheError::server(404, "brand not found"));
    }

    #[test]
    fn test_server_error_plain_text() {
        let err = server_error(StatusCode::BAD_GATEWAY, b"upstream down");
        assert_eq!(err, CacheError::server(502, "upstream down"));

        let err = server_error(StatusCode::INTERNAL_SERVER_ERROR, b"");
        assert_eq!(err, CacheError::server(500, "Internal Server Error"));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let base = serve_once("200 OK", r#"{"results":[{"id":1}],"message":"ok","statusCode":200}"#).await;
        let transport = HttpTransport::new(HttpConfig::new(&base).unwrap()).unwrap();

        let body = transport
            .execute(&Request::get("/brands").param("plant", "A"))
            .await
            .unwrap();
        // The transport returns the raw body; the cache unwraps envelopes
        assert_eq!(body["results"], json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_execute_server_error() {
        let base = serve_once("500 Internal Server Error", r#"{"message":"db offline"}"#).await;
        let transport = HttpTransport::new(HttpConfig::new(&base).unwrap()).unwrap();

        let err = transport.execute(&Request::get("/brands")).await.unwrap_err();
        assert_eq!(err, CacheError::server(500, "db offline"));
    }

    #[tokio::test]
    async fn test_execute_invalid_json() {
        let base = serve_once("200 OK", "<html>").await;
        let transport = HttpTransport::new(HttpConfig::new(&base).unwrap()).unwrap();

        let err = transport.execute(&Request::get("/brands")).await.unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(HttpConfig::new(&format!("http://{addr}/")).unwrap()).unwrap();
        let err = transport.execute(&Request::get("/brands")).await.unwrap_err();
        assert!(matches!(err, CacheError::Network(_)));
    }
}
