use crate::client::{BufferedService, map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::registry::DecoderRegistry;
use crate::resolve::UriResolver;
use crate::response::{HttpResponse, ResponseBody};
use bytes::Bytes;
use http::{Request, Response, Uri};
use http_body_util::Full;
use serde::Serialize;
use std::sync::Arc;
use tower::Service;

/// Body type for the request builder
#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    /// JSON-serialized body (stored as bytes after serialization)
    Json(Bytes),
    /// Form URL-encoded body (stored as bytes after serialization)
    Form(Bytes),
}

/// HTTP request builder with fluent API.
///
/// Created by [`HttpClient::get`](crate::HttpClient::get),
/// [`HttpClient::post`](crate::HttpClient::post), etc. Headers and body
/// are chained before the request goes out with
/// [`send()`](RequestBuilder::send) or a typed
/// [`fetch()`](RequestBuilder::fetch).
///
/// The request path is resolved through the client's
/// [`UriResolver`](crate::UriResolver) when the request is sent, so
/// clients built with a base URL accept relative paths here.
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder()
///     .base_url("https://api.example.com/v1")
///     .build()?;
///
/// // Typed GET through the decoder registry
/// let users: UserList = client.get("users").fetch().await?;
///
/// // POST with JSON body, raw response
/// let resp = client
///     .post("users")
///     .header("x-request-id", "123")
///     .json(&NewUser { name: "Alice" })?
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() or .fetch() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    resolver: Arc<dyn UriResolver>,
    decoders: Arc<DecoderRegistry>,
    max_body_size: usize,
    method: http::Method,
    path: Option<String>,
    headers: Vec<(http::header::HeaderName, http::header::HeaderValue)>,
    body: BodyKind,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        service: BufferedService,
        resolver: Arc<dyn UriResolver>,
        decoders: Arc<DecoderRegistry>,
        max_body_size: usize,
        method: http::Method,
        path: Option<String>,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            resolver,
            decoders,
            max_body_size,
            method,
            path,
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
            transport_security,
        }
    }

    /// Add a single header to the request.
    ///
    /// Invalid names or values are deferred and surface at `send()`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (
            http::header::HeaderName::try_from(name),
            http::header::HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.push((name, value));
            }
            (Err(e), _) => {
                self.error = Some(HttpError::InvalidHeaderName(e));
            }
            (_, Err(e)) => {
                self.error = Some(HttpError::InvalidHeaderValue(e));
            }
        }
        self
    }

    /// Add multiple headers to the request.
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        for (name, value) in headers {
            self = self.header(&name, &value);
        }
        self
    }

    /// Set the request body as JSON.
    ///
    /// Sets Content-Type to `application/json` unless one was already
    /// provided.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Json`] if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let json_bytes = serde_json::to_vec(body)?;
        self.body = BodyKind::Json(Bytes::from(json_bytes));
        Ok(self)
    }

    /// Set the request body as form URL-encoded fields.
    ///
    /// Sets Content-Type to `application/x-www-form-urlencoded` unless one
    /// was already provided.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::FormEncode`] if encoding fails.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let form_string = serde_urlencoded::to_string(fields)?;
        self.body = BodyKind::Form(Bytes::from(form_string));
        Ok(self)
    }

    /// Set the request body as raw bytes.
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    /// Set the request body as a string.
    pub fn body_string(mut self, body: String) -> Self {
        self.body = BodyKind::Bytes(Bytes::from(body));
        self
    }

    /// Send the request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` if:
    /// - Request building failed (invalid headers, unresolvable path)
    /// - The resolved URI is invalid for the transport security mode
    /// - Network/transport error or timeout
    /// - The request buffer is full (`Overloaded`)
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.resolver.resolve(self.path.as_deref())?;
        validate_transport(&uri, self.transport_security)?;

        let mut builder = Request::builder().method(self.method).uri(uri);

        // Add default Content-Type only if the caller didn't supply one
        let has_content_type = self
            .headers
            .iter()
            .any(|(name, _)| name == http::header::CONTENT_TYPE);
        if !has_content_type {
            match &self.body {
                BodyKind::Json(_) => {
                    builder = builder.header("content-type", "application/json");
                }
                BodyKind::Form(_) => {
                    builder = builder.header("content-type", "application/x-www-form-urlencoded");
                }
                BodyKind::Empty | BodyKind::Bytes(_) => {}
            }
        }

        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body_bytes = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(b) | BodyKind::Json(b) | BodyKind::Form(b) => b,
        };

        let request = builder.body(Full::new(body_bytes))?;

        // Fail fast if the buffer is full
        try_acquire_buffer_slot(&mut self.service).await?;

        let inner: Response<ResponseBody> =
            self.service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }

    /// Send the request and decode the response into `T`.
    ///
    /// The decoder is looked up before the request goes out; a missing
    /// registration fails fast with [`HttpError::NoDecoder`] and nothing
    /// is sent.
    ///
    /// # Errors
    ///
    /// Everything [`send()`](RequestBuilder::send) can return, plus
    /// [`HttpError::NoDecoder`] and the decoder's own errors (typically
    /// [`HttpError::Status`] for gated error statuses).
    pub async fn fetch<T: 'static>(self) -> Result<T, HttpError> {
        let decoder = self
            .decoders
            .lookup::<T>()
            .ok_or(HttpError::NoDecoder {
                type_name: std::any::type_name::<T>(),
            })?;
        let response = self.send().await?;
        decoder.decode(response).await
    }
}

/// Check the resolved URI against the transport security mode.
fn validate_transport(uri: &Uri, transport: TransportSecurity) -> Result<(), HttpError> {
    if uri.authority().is_none() {
        return Err(HttpError::InvalidUri {
            url: uri.to_string(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }
    match uri.scheme_str() {
        Some("https") => Ok(()),
        Some("http") => match transport {
            TransportSecurity::AllowInsecureHttp => Ok(()),
            TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
        },
        Some(scheme) => Err(HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
        None => Err(HttpError::InvalidUri {
            url: uri.to_string(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpClient;
    use httpmock::prelude::*;

    #[test]
    fn validate_transport_accepts_https() {
        let uri: Uri = "https://api.example.com/x".parse().unwrap();
        assert!(validate_transport(&uri, TransportSecurity::TlsOnly).is_ok());
    }

    #[test]
    fn validate_transport_rejects_http_when_tls_only() {
        let uri: Uri = "http://api.example.com/x".parse().unwrap();
        assert!(matches!(
            validate_transport(&uri, TransportSecurity::TlsOnly),
            Err(HttpError::InvalidScheme { .. })
        ));
        assert!(validate_transport(&uri, TransportSecurity::AllowInsecureHttp).is_ok());
    }

    #[test]
    fn validate_transport_rejects_other_schemes() {
        let uri: Uri = "ftp://files.example.com/x".parse().unwrap();
        assert!(matches!(
            validate_transport(&uri, TransportSecurity::AllowInsecureHttp),
            Err(HttpError::InvalidScheme { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_header_is_deferred_to_send() {
        let client = HttpClient::builder().no_retries().build().unwrap();
        let result = client
            .get("https://api.example.com/x")
            .header("bad header", "v")
            .send()
            .await;
        assert!(matches!(result, Err(HttpError::InvalidHeaderName(_))));
    }

    #[tokio::test]
    async fn missing_path_without_base_is_an_error() {
        let client = HttpClient::builder().no_retries().build().unwrap();
        let result = client.get(None).send().await;
        assert!(matches!(result, Err(HttpError::PathRequired(_))));
    }

    #[tokio::test]
    async fn form_body_sets_content_type() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("grant_type=client_credentials");
            then.status(200).body("ok");
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .no_retries()
            .base_url(server.base_url())
            .build()
            .unwrap();

        let body: String = client
            .post("token")
            .form(&[("grant_type", "client_credentials")])
            .unwrap()
            .fetch()
            .await
            .unwrap();

        mock.assert();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn caller_content_type_is_not_overridden() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/items")
                .header("content-type", "application/json; charset=utf-8");
            then.status(200);
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .no_retries()
            .base_url(server.base_url())
            .build()
            .unwrap();

        client
            .post("items")
            .header("content-type", "application/json; charset=utf-8")
            .json(&serde_json::json!({"a": 1}))
            .unwrap()
            .send()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn redirects_are_followed_up_to_the_limit() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(302).header("location", &server.url("/new"));
        });
        let target = server.mock(|when, then| {
            when.method(GET).path("/new");
            then.status(200).body("moved");
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .no_retries()
            .base_url(server.base_url())
            .build()
            .unwrap();

        let body: String = client.get("old").fetch().await.unwrap();
        target.assert();
        assert_eq!(body, "moved");
    }

    #[tokio::test]
    async fn same_origin_redirect_keeps_credentials() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(302).header("location", &server.url("/new"));
        });
        let target = server.mock(|when, then| {
            when.method(GET)
                .path("/new")
                .header("authorization", "Bearer token");
            then.status(200).body("ok");
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .no_retries()
            .base_url(server.base_url())
            .build()
            .unwrap();

        let body: String = client
            .get("old")
            .header("authorization", "Bearer token")
            .fetch()
            .await
            .unwrap();

        target.assert();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn cross_origin_redirect_strips_credentials() {
        let origin = MockServer::start_async().await;
        let other = MockServer::start_async().await;
        origin.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(302).header("location", &other.url("/target"));
        });
        let target = other.mock(|when, then| {
            when.method(GET)
                .path("/target")
                .header_missing("authorization")
                .header_missing("cookie");
            then.status(200).body("clean");
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .no_retries()
            .base_url(origin.base_url())
            .build()
            .unwrap();

        let body: String = client
            .get("old")
            .header("authorization", "Bearer secret")
            .header("cookie", "sid=1")
            .fetch()
            .await
            .unwrap();

        target.assert();
        assert_eq!(body, "clean");
    }

    #[tokio::test]
    async fn redirects_are_not_followed_when_disabled() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(302).header("location", &server.url("/new"));
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .no_retries()
            .max_redirects(0)
            .base_url(server.base_url())
            .build()
            .unwrap();

        let response = client.get("old").send().await.unwrap();
        assert_eq!(response.status(), http::StatusCode::FOUND);
    }
}
