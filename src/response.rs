use crate::error::HttpError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode, Version};
use http_body_util::BodyExt;

/// Boxed response body with a unified error type
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// HTTP response handed to decoders.
///
/// Wraps the raw `http::Response` together with the client's body size
/// limit. The body is streamed from the connection; [`bytes()`]
/// (HttpResponse::bytes) collects it fully, enforcing the limit.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    /// Response status code
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Response headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// HTTP version of the response
    #[must_use]
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Collect the full response body.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::BodyTooLarge`] when the body exceeds the
    /// configured limit and [`HttpError::Transport`] on stream failures.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let limit = self.max_body_size;
        let mut body = self.inner.into_body();
        let mut collected = BytesMut::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(HttpError::Transport)?;
            if let Ok(data) = frame.into_data() {
                if collected.len() + data.len() > limit {
                    return Err(HttpError::BodyTooLarge {
                        limit,
                        actual: collected.len() + data.len(),
                    });
                }
                collected.extend_from_slice(&data);
            }
        }
        Ok(collected.freeze())
    }
}

#[cfg(test)]
pub(crate) fn fixture(status: u16, body: &str) -> HttpResponse {
    fixture_with_limit(status, body, 16 * 1024 * 1024)
}

#[cfg(test)]
pub(crate) fn fixture_with_limit(status: u16, body: &str, max_body_size: usize) -> HttpResponse {
    let boxed: ResponseBody = http_body_util::Full::new(Bytes::copy_from_slice(body.as_bytes()))
        .map_err(|never| match never {})
        .boxed();
    let inner = Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(boxed)
        .unwrap();
    HttpResponse {
        inner,
        max_body_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_body_within_limit() {
        let response = fixture(200, "hello");
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.bytes().await.unwrap();
        assert_eq!(body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn empty_body_collects_to_empty() {
        let response = fixture(204, "");
        let body = response.bytes().await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let response = fixture_with_limit(200, "0123456789", 4);
        match response.bytes().await {
            Err(HttpError::BodyTooLarge { limit, actual }) => {
                assert_eq!(limit, 4);
                assert!(actual > 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
