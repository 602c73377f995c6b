use axum::body::Body;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

/// Inbound request as seen by handlers.
///
/// The body is buffered before dispatch. Route parameters are filled in by the
/// router that matched the request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: Vec::new(),
        }
    }

    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            params: Vec::new(),
        }
    }

    /// Buffer an `http` request, refusing bodies larger than `limit` bytes.
    pub async fn from_http(req: http::Request<Body>, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, limit).await?;
        Ok(Self::from_parts(parts.method, parts.uri, parts.headers, body))
    }

    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Route parameter captured by the matched path pattern.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Deserialize the buffered body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        name: String,
    }

    #[tokio::test]
    async fn from_http_buffers_body_and_keeps_parts() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/echo?verbose=1")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"svc"}"#))
            .unwrap();

        let req = Request::from_http(req, 1024).await.unwrap();
        assert_eq!(*req.method(), Method::POST);
        assert_eq!(req.path(), "/echo");
        assert_eq!(req.query(), Some("verbose=1"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(
            req.json::<Payload>().unwrap(),
            Payload {
                name: "svc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn from_http_rejects_oversized_body() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();

        assert!(Request::from_http(req, 16).await.is_err());
    }

    #[test]
    fn params_lookup() {
        let req = Request::new(Method::GET, Uri::from_static("/users/42")).with_params(vec![(
            "id".to_string(),
            "42".to_string(),
        )]);
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param("missing"), None);
    }
}
