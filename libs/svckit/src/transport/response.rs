use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;

/// Response sink handed to handlers.
///
/// Cheap to clone; all clones write to the same underlying response. Exactly one
/// response is delivered: the first `send*`/`json` call wins and later writes are
/// dropped with a warning.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Mutex<State>>,
}

struct State {
    status: StatusCode,
    headers: HeaderMap,
    sender: Option<oneshot::Sender<http::Response<Body>>>,
}

/// Receiving half of a [`Response`]; resolves once the handler has responded.
pub struct PendingResponse {
    rx: oneshot::Receiver<http::Response<Body>>,
}

impl PendingResponse {
    /// Wait for the response. `None` when every sink was dropped without responding.
    pub async fn wait(self) -> Option<http::Response<Body>> {
        self.rx.await.ok()
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("headers", &state.headers.len())
            .field("sent", &state.sender.is_none())
            .finish()
    }
}

impl Response {
    pub fn channel() -> (Self, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            inner: Arc::new(Mutex::new(State {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                sender: Some(tx),
            })),
        };
        (sink, PendingResponse { rx })
    }

    /// Set several headers at once. Invalid names or values are skipped.
    pub fn set<'a, I>(&self, headers: I) -> &Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut state = self.inner.lock();
        for (name, value) in headers {
            match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    state.headers.insert(name, value);
                }
                _ => tracing::warn!(header = name, "Ignoring invalid response header"),
            }
        }
        drop(state);
        self
    }

    pub fn header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.inner.lock().headers.insert(name, value);
        self
    }

    /// Set the status used by the next `send`/`json`.
    pub fn status(&self, status: StatusCode) -> &Self {
        self.inner.lock().status = status;
        self
    }

    /// Respond with `status` and an empty body.
    pub fn send_status(&self, status: StatusCode) {
        self.status(status);
        self.deliver(Body::empty());
    }

    /// Respond with a raw body (`text/plain` unless a content type was set).
    pub fn send(&self, body: impl Into<Bytes>) {
        {
            let mut state = self.inner.lock();
            if !state.headers.contains_key(header::CONTENT_TYPE) {
                state.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
            }
        }
        self.deliver(Body::from(body.into()));
    }

    /// Respond with `body` serialized as JSON.
    ///
    /// Nothing is sent when serialization fails.
    pub fn json<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(body)?;
        self.inner.lock().headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.deliver(Body::from(bytes));
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.inner.lock().sender.is_none()
    }

    fn deliver(&self, body: Body) -> bool {
        let mut state = self.inner.lock();
        let Some(sender) = state.sender.take() else {
            tracing::warn!("Response already sent; dropping additional write");
            return false;
        };

        let mut response = http::Response::new(body);
        *response.status_mut() = state.status;
        *response.headers_mut() = std::mem::take(&mut state.headers);
        drop(state);

        if sender.send(response).is_err() {
            tracing::debug!("Response receiver dropped before delivery");
        }
        true
    }
}
