use crate::builder::ClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::registry::DecoderRegistry;
use crate::request::RequestBuilder;
use crate::resolve::UriResolver;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use tower::Service;
use tower::buffer::Buffer;

/// Future produced by the boxed client stack
pub(crate) type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// The buffered tower stack shared by all clones of a client
pub(crate) type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// HTTP client handle.
///
/// Cheap to clone; all clones share one connection pool, one resolver and
/// one decoder registry. Requests are issued through a bounded buffer, so
/// the handle is `Send + Sync` without locking.
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder()
///     .base_url("https://api.example.com/v1")
///     .build()?;
///
/// // Typed fetch through the decoder registry
/// let status: String = client.get("status").fetch().await?;
///
/// // Raw response access
/// let response = client.get("status").send().await?;
/// println!("{}", response.status());
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) resolver: Arc<dyn UriResolver>,
    pub(crate) decoders: Arc<DecoderRegistry>,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("resolver", &self.resolver)
            .field("decoders", &self.decoders)
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Builder with default configuration.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Start a request with an arbitrary method.
    ///
    /// `path` goes through the configured resolver: `None` targets the
    /// base URL itself (relative resolver only), `Some` is resolved per
    /// the resolver's rules.
    pub fn request<'a>(
        &self,
        method: Method,
        path: impl Into<Option<&'a str>>,
    ) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            Arc::clone(&self.resolver),
            Arc::clone(&self.decoders),
            self.max_body_size,
            method,
            path.into().map(ToOwned::to_owned),
            self.transport_security,
        )
    }

    /// Start a GET request.
    pub fn get<'a>(&self, path: impl Into<Option<&'a str>>) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Start a POST request.
    pub fn post<'a>(&self, path: impl Into<Option<&'a str>>) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Start a PUT request.
    pub fn put<'a>(&self, path: impl Into<Option<&'a str>>) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Start a PATCH request.
    pub fn patch<'a>(&self, path: impl Into<Option<&'a str>>) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    /// Start a DELETE request.
    pub fn delete<'a>(&self, path: impl Into<Option<&'a str>>) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Start a HEAD request.
    pub fn head<'a>(&self, path: impl Into<Option<&'a str>>) -> RequestBuilder {
        self.request(Method::HEAD, path)
    }

    /// Result type names the client can decode, sorted.
    #[must_use]
    pub fn decoder_keys(&self) -> Vec<&'static str> {
        self.decoders.keys()
    }
}

/// Reserve a buffer slot without waiting.
///
/// A full buffer fails fast with [`HttpError::Overloaded`] instead of
/// queueing the caller.
pub(crate) async fn try_acquire_buffer_slot(
    service: &mut BufferedService,
) -> Result<(), HttpError> {
    std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
        Poll::Ready(Err(error)) => Poll::Ready(Err(map_buffer_error(error))),
        Poll::Pending => Poll::Ready(Err(HttpError::Overloaded)),
    })
    .await
}

/// Map buffer-layer errors onto the public taxonomy.
pub(crate) fn map_buffer_error(error: tower::BoxError) -> HttpError {
    if error.is::<tower::buffer::error::Closed>() {
        return HttpError::ServiceClosed;
    }
    match error.downcast::<HttpError>() {
        Ok(own) => *own,
        Err(other) => HttpError::Transport(other),
    }
}
