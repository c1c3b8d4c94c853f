//! Typed response decoding.
//!
//! Every decoder funnels through one status gate: the body is collected
//! first (draining the connection regardless of outcome), then statuses of
//! 300 and above turn into [`HttpError::Status`] unless the decoder was
//! built with `always_decode_body` and a body is actually present.

use crate::error::HttpError;
use crate::response::HttpResponse;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Converts a response into a value of type `T`.
///
/// Implementations decide what counts as decodable; the provided decoders
/// all enforce the shared status gate via [`read_gated`].
#[async_trait]
pub trait ResponseDecoder<T>: Send + Sync {
    /// Decode the response into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Status`] for gated error statuses and a
    /// decoder-specific error when the body cannot be converted.
    async fn decode(&self, response: HttpResponse) -> Result<T, HttpError>;
}

/// Response body after the status gate has passed.
pub(crate) struct GatedBody {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Collect the body and apply the status gate.
///
/// Statuses of 300 and above raise [`HttpError::Status`]; with
/// `always_decode_body` a non-empty body suppresses the error and is
/// returned for decoding instead. An empty body on an error status always
/// raises.
pub(crate) async fn read_gated(
    response: HttpResponse,
    always_decode_body: bool,
) -> Result<GatedBody, HttpError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    if status.as_u16() >= 300 && (body.is_empty() || !always_decode_body) {
        return Err(HttpError::status(status));
    }
    Ok(GatedBody { headers, body })
}

/// Decodes the body as text.
///
/// UTF-8 and unspecified charsets are decoded directly; anything else is
/// decoded lossily with a debug log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder {
    always_decode_body: bool,
}

impl TextDecoder {
    #[must_use]
    pub fn new(always_decode_body: bool) -> Self {
        Self { always_decode_body }
    }
}

fn declared_charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(http::header::CONTENT_TYPE)?.to_str().ok()?;
    let mime: mime::Mime = content_type.parse().ok()?;
    let charset = mime.get_param(mime::CHARSET)?;
    Some(charset.as_str().to_ascii_lowercase())
}

#[async_trait]
impl ResponseDecoder<String> for TextDecoder {
    async fn decode(&self, response: HttpResponse) -> Result<String, HttpError> {
        let gated = read_gated(response, self.always_decode_body).await?;
        if let Some(charset) = declared_charset(&gated.headers) {
            if charset != "utf-8" {
                tracing::debug!(%charset, "decoding non-UTF-8 body lossily");
            }
        }
        Ok(String::from_utf8_lossy(&gated.body).into_owned())
    }
}

/// Decodes the body as raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder {
    always_decode_body: bool,
}

impl BytesDecoder {
    #[must_use]
    pub fn new(always_decode_body: bool) -> Self {
        Self { always_decode_body }
    }
}

#[async_trait]
impl ResponseDecoder<Bytes> for BytesDecoder {
    async fn decode(&self, response: HttpResponse) -> Result<Bytes, HttpError> {
        let gated = read_gated(response, self.always_decode_body).await?;
        Ok(gated.body)
    }
}

/// Decodes the body as JSON into `T`.
///
/// An empty body on a successful status yields `T::default()`, matching
/// the behavior of the other decoders for bodyless responses.
pub struct JsonDecoder<T> {
    always_decode_body: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    #[must_use]
    pub fn new(always_decode_body: bool) -> Self {
        Self {
            always_decode_body,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new(self.always_decode_body)
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("always_decode_body", &self.always_decode_body)
            .finish()
    }
}

#[async_trait]
impl<T> ResponseDecoder<T> for JsonDecoder<T>
where
    T: DeserializeOwned + Default + Send + 'static,
{
    async fn decode(&self, response: HttpResponse) -> Result<T, HttpError> {
        let gated = read_gated(response, self.always_decode_body).await?;
        if gated.body.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&gated.body)?)
    }
}
