use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use edgekit_core::config::BackendConfig;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("function returned HTTP {status}")]
    Status { status: u16, body: Value },
}

#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub name: String,
    pub payload: Value,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub status: u16,
    /// Parsed JSON when the body is JSON, otherwise the raw text as a string.
    pub body: Value,
}

/// Invokes deployed edge functions through the backend gateway.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait FunctionInvoker: Send + Sync {
    fn invoke<'a>(
        &'a self,
        request: &'a InvokeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InvokeResponse, InvokeError>> + Send + 'a>>;
}

/// `POST {url}/functions/v1/{name}` with the service role key as bearer token.
pub struct HttpBackendClient {
    http: reqwest::Client,
    base_url: String,
    service_role_key: Option<String>,
}

impl HttpBackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, InvokeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InvokeError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        })
    }

    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{name}", self.base_url)
    }

    /// Default headers first, caller headers override them.
    fn build_headers(&self, extra: &BTreeMap<String, String>) -> Result<HeaderMap, InvokeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.service_role_key {
            headers.insert(AUTHORIZATION, header_value("authorization", &format!("Bearer {key}"))?);
            headers.insert(HeaderName::from_static("apikey"), header_value("apikey", key)?);
        }

        for (name, value) in extra {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| InvokeError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value(name, value)?);
        }
        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, InvokeError> {
    HeaderValue::from_str(value).map_err(|e| InvokeError::InvalidHeader {
        name: name.into(),
        reason: e.to_string(),
    })
}

impl FunctionInvoker for HttpBackendClient {
    fn invoke<'a>(
        &'a self,
        request: &'a InvokeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InvokeResponse, InvokeError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.function_url(&request.name);
            let headers = self.build_headers(&request.headers)?;

            tracing::info!(function = %request.name, url = %url, "Invoking edge function");

            let resp = self
                .http
                .post(&url)
                .headers(headers)
                .json(&request.payload)
                .send()
                .await
                .map_err(|e| InvokeError::Http(e.to_string()))?;

            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| InvokeError::Http(format!("failed to read response body: {e}")))?;
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

            if !status.is_success() {
                tracing::warn!(function = %request.name, status = status.as_u16(), "Edge function returned an error");
                return Err(InvokeError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(InvokeResponse {
                status: status.as_u16(),
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(key: Option<&str>) -> HttpBackendClient {
        HttpBackendClient::new(&BackendConfig {
            url: "http://localhost:8000/".into(),
            service_role_key: key.map(String::from),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[test]
    fn builds_function_url_without_double_slash() {
        assert_eq!(
            client(None).function_url("hello"),
            "http://localhost:8000/functions/v1/hello"
        );
    }

    #[test]
    fn service_key_sets_auth_headers() {
        let headers = client(Some("svc")).build_headers(&BTreeMap::new()).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer svc");
        assert_eq!(headers["apikey"], "svc");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn caller_headers_override_defaults() {
        let mut extra = BTreeMap::new();
        extra.insert("Authorization".to_string(), "Bearer user-jwt".to_string());
        extra.insert("x-request-id".to_string(), "abc".to_string());

        let headers = client(Some("svc")).build_headers(&extra).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer user-jwt");
        assert_eq!(headers["x-request-id"], "abc");
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut extra = BTreeMap::new();
        extra.insert("bad header".to_string(), "v".to_string());
        let err = client(None).build_headers(&extra).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidHeader { .. }));
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_http_error() {
        let client = HttpBackendClient::new(&BackendConfig {
            url: "http://127.0.0.1:9".into(),
            service_role_key: None,
            timeout_secs: 2,
        })
        .unwrap();
        let request = InvokeRequest {
            name: "hello".into(),
            payload: serde_json::json!({}),
            headers: BTreeMap::new(),
        };
        assert!(matches!(
            client.invoke(&request).await,
            Err(InvokeError::Http(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires a self-hosted stack on localhost:8000 with a `hello` function
    async fn invokes_real_function() {
        let client = client(std::env::var("EDGEKIT_SERVICE_ROLE_KEY").ok().as_deref());
        let request = InvokeRequest {
            name: "hello".into(),
            payload: serde_json::json!({"name": "edgekit"}),
            headers: BTreeMap::new(),
        };
        let response = client.invoke(&request).await.unwrap();
        assert_eq!(response.status, 200);
    }
}
