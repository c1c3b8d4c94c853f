use crate::client::{BufferedService, HttpClient};
use crate::config::{ClientConfig, RetryConfig, TlsRoots};
use crate::error::HttpError;
use crate::layers::{RedirectPolicy, RetryPolicy, UserAgentLayer};
use crate::registry::DecoderRegistry;
use crate::resolve::{AbsoluteResolver, RelativeResolver, UriResolver};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::retry::RetryLayer;
use tower::timeout::TimeoutLayer;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::follow_redirect::FollowRedirectLayer;

/// Builder for [`HttpClient`].
///
/// Starts from [`ClientConfig::default()`] (or any preset via
/// [`from_config`](ClientBuilder::from_config)) and assembles the tower
/// stack over a pooled hyper client at [`build()`](ClientBuilder::build).
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder()
///     .base_url("https://api.example.com/v1")
///     .timeout(Duration::from_secs(10))
///     .build()?;
///
/// let body: String = client.get("status").fetch().await?;
/// ```
#[derive(Debug, Default)]
#[must_use = "ClientBuilder does nothing until .build() is called"]
pub struct ClientBuilder {
    config: ClientConfig,
    base_url: Option<String>,
    mount_context: Option<String>,
    decoders: Option<DecoderRegistry>,
}

impl ClientBuilder {
    /// Builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder starting from an explicit configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Total per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Maximum response body size in bytes.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Maximum redirect hops to follow; 0 disables following.
    pub fn max_redirects(mut self, hops: usize) -> Self {
        self.config.max_redirects = hops;
        self
    }

    /// Capacity of the in-flight request buffer.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Idle connections kept per host by the pool.
    pub fn pool_max_idle_per_host(mut self, count: usize) -> Self {
        self.config.pool_max_idle_per_host = count;
        self
    }

    /// How long an idle pooled connection is kept alive.
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Default `User-Agent` for requests that do not set one.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Retry policy for transport and timeout failures.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = Some(retry);
        self
    }

    /// Disable retries.
    pub fn no_retries(mut self) -> Self {
        self.config.retry = None;
        self
    }

    /// Certificate roots for TLS.
    pub fn tls_roots(mut self, roots: TlsRoots) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Accept plain `http://` URLs.
    ///
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[cfg(any(test, debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.transport_security = crate::config::TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Resolve request paths relative to `base`.
    ///
    /// Without a base, only fully qualified URLs are accepted per request.
    pub fn base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// Mount context spliced in front of host-absolute request paths.
    ///
    /// Requires [`base_url`](ClientBuilder::base_url).
    pub fn mount_context(mut self, context: impl Into<String>) -> Self {
        self.mount_context = Some(context.into());
        self
    }

    /// Decoder registry for [`fetch`](crate::RequestBuilder::fetch).
    ///
    /// Defaults to [`DecoderRegistry::with_defaults()`].
    pub fn decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = Some(decoders);
        self
    }

    /// Build the client.
    ///
    /// Must be called within a tokio runtime: the request buffer spawns a
    /// background worker.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidConfig`] for an invalid base URL or
    /// mount context, [`HttpError::Tls`] when the TLS connector cannot be
    /// built, and [`HttpError::InvalidHeaderValue`] for an unusable
    /// user-agent string.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let config = self.config;

        let resolver: Arc<dyn UriResolver> = match (&self.base_url, &self.mount_context) {
            (Some(base), Some(context)) => {
                Arc::new(RelativeResolver::with_context(base, context)?)
            }
            (Some(base), None) => Arc::new(RelativeResolver::new(base)?),
            (None, Some(_)) => {
                return Err(HttpError::invalid_config(
                    "mount_context requires base_url",
                ));
            }
            (None, None) => Arc::new(AbsoluteResolver),
        };

        let decoders = Arc::new(
            self.decoders
                .unwrap_or_else(DecoderRegistry::with_defaults),
        );

        let connector =
            tls::build_https_connector(config.tls_roots, config.transport_security)?;

        let mut hyper_builder = Client::builder(TokioExecutor::new());
        hyper_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(idle) = config.pool_idle_timeout {
            hyper_builder.pool_idle_timeout(idle);
        }
        let hyper_client = hyper_builder.build::<_, Full<Bytes>>(connector);

        let timeout = config.timeout;
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(UserAgentLayer::new(&config.user_agent)?)
            .layer(FollowRedirectLayer::with_policy(RedirectPolicy::new(
                config.max_redirects,
            )))
            .service(hyper_client)
            .map_response(box_response_body::<hyper::body::Incoming>)
            .map_err(move |error| map_tower_error(error, timeout));

        let mut boxed = service.boxed_clone();
        if let Some(retry) = &config.retry {
            boxed = ServiceBuilder::new()
                .layer(RetryLayer::new(RetryPolicy::new(retry)))
                .service(boxed)
                .boxed_clone();
        }

        let service: BufferedService = Buffer::new(boxed, config.buffer_capacity.max(1));

        Ok(HttpClient {
            service,
            resolver,
            decoders,
            max_body_size: config.max_body_size,
            transport_security: config.transport_security,
        })
    }
}

/// Erase the concrete hyper body type behind [`ResponseBody`].
fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}

/// Map stack-internal boxed errors onto the public taxonomy.
fn map_tower_error(error: tower::BoxError, timeout: Duration) -> HttpError {
    if error.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    match error.downcast::<HttpError>() {
        Ok(own) => *own,
        Err(other) => HttpError::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportSecurity;

    #[tokio::test]
    async fn build_with_defaults() {
        let client = ClientBuilder::new().build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn build_with_base_and_context() {
        let client = ClientBuilder::new()
            .base_url("https://api.example.com/v1/items")
            .mount_context("/v1")
            .build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn invalid_base_fails_at_build() {
        let result = ClientBuilder::new().base_url("api.example.com").build();
        assert!(matches!(result, Err(HttpError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn context_outside_base_path_fails_at_build() {
        let result = ClientBuilder::new()
            .base_url("https://api.example.com/v1/items")
            .mount_context("/v2")
            .build();
        assert!(matches!(result, Err(HttpError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn context_without_base_fails_at_build() {
        let result = ClientBuilder::new().mount_context("/v1").build();
        assert!(matches!(result, Err(HttpError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn invalid_user_agent_fails_at_build() {
        let result = ClientBuilder::new().user_agent("bad\nagent").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[test]
    fn setters_update_config() {
        let builder = ClientBuilder::new()
            .timeout(Duration::from_secs(3))
            .max_body_size(1024)
            .max_redirects(0)
            .buffer_capacity(16)
            .no_retries();
        assert_eq!(builder.config.timeout, Duration::from_secs(3));
        assert_eq!(builder.config.max_body_size, 1024);
        assert_eq!(builder.config.max_redirects, 0);
        assert_eq!(builder.config.buffer_capacity, 16);
        assert!(builder.config.retry.is_none());
    }

    #[test]
    fn allow_insecure_http_switches_mode() {
        let builder = ClientBuilder::new().allow_insecure_http();
        assert_eq!(
            builder.config.transport_security,
            TransportSecurity::AllowInsecureHttp
        );
    }
}
