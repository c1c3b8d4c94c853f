use rand::Rng;
use std::time::Duration;

/// Transport security mode for outgoing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportSecurity {
    /// Only `https://` URLs are accepted (default)
    #[default]
    TlsOnly,
    /// Plain `http://` URLs are also accepted.
    ///
    /// Only constructible in debug builds or with the
    /// `allow-insecure-http` feature.
    AllowInsecureHttp,
}

/// Which certificate roots the TLS connector trusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsRoots {
    /// Bundled webpki roots (Mozilla CA store)
    #[default]
    Webpki,
    /// Certificates from the operating system trust store
    Native,
}

/// Backoff schedule for retry delays
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound for any single delay
    pub max: Duration,
    /// Multiplier applied per attempt
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ExponentialBackoff {
    /// Delay before retry number `attempt` (zero-based)
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .multiplier
            .powi(i32::try_from(attempt.min(16)).unwrap_or(16));
        let capped = (self.initial.as_secs_f64() * exp).min(self.max.as_secs_f64());
        let secs = if self.jitter {
            capped * (1.0 + rand::rng().random_range(0.0..0.25))
        } else {
            capped
        };
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64() * 1.25))
    }
}

/// Retry policy configuration.
///
/// Retries fire only for transport and timeout failures on idempotent
/// methods. Error status codes are never retried; they belong to the
/// response decoding layer.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Delay schedule between attempts
    pub backoff: ExponentialBackoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: ExponentialBackoff::default(),
        }
    }
}

/// True for methods that are safe to replay without side effects
#[must_use]
pub fn is_idempotent(method: &http::Method) -> bool {
    matches!(
        *method,
        http::Method::GET
            | http::Method::HEAD
            | http::Method::PUT
            | http::Method::DELETE
            | http::Method::OPTIONS
            | http::Method::TRACE
    )
}

/// Configuration for [`HttpClient`](crate::HttpClient).
///
/// A plain value object: construct one (or start from a preset), adjust
/// fields, then hand it to [`ClientBuilder`](crate::ClientBuilder). The
/// builder consumes it once; there is no shared mutable state after
/// `build()`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total per-request timeout (connect + transfer)
    pub timeout: Duration,
    /// Maximum response body size in bytes
    pub max_body_size: usize,
    /// Maximum redirect hops to follow; 0 disables following
    pub max_redirects: usize,
    /// Capacity of the in-flight request buffer
    pub buffer_capacity: usize,
    /// Idle connections kept per host by the pool
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept alive
    pub pool_idle_timeout: Option<Duration>,
    /// `User-Agent` sent when the caller did not set one
    pub user_agent: String,
    /// Retry policy; `None` disables retries
    pub retry: Option<RetryConfig>,
    /// Certificate roots for TLS
    pub tls_roots: TlsRoots,
    pub(crate) transport_security: TransportSecurity,
}

/// Default `User-Agent` header value
pub const DEFAULT_USER_AGENT: &str = concat!("waypoint-http/", env!("CARGO_PKG_VERSION"));

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body_size: 16 * 1024 * 1024,
            max_redirects: 5,
            buffer_capacity: 256,
            pool_max_idle_per_host: 8,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::default()),
            tls_roots: TlsRoots::Webpki,
            transport_security: TransportSecurity::TlsOnly,
        }
    }
}

impl ClientConfig {
    /// Minimal configuration: no retries, no redirect following
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            retry: None,
            max_redirects: 0,
            ..Self::default()
        }
    }

    /// Short timeouts and plain-HTTP transport for test servers.
    ///
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[cfg(any(test, debug_assertions, feature = "allow-insecure-http"))]
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry: None,
            transport_security: TransportSecurity::AllowInsecureHttp,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_tls_only_with_retries() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.transport_security, TransportSecurity::TlsOnly);
        assert!(cfg.retry.is_some());
        assert_eq!(cfg.max_redirects, 5);
        assert!(cfg.user_agent.starts_with("waypoint-http/"));
    }

    #[test]
    fn minimal_disables_retries_and_redirects() {
        let cfg = ClientConfig::minimal();
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.max_redirects, 0);
    }

    #[test]
    fn for_testing_allows_insecure_http() {
        let cfg = ClientConfig::for_testing();
        assert_eq!(
            cfg.transport_security,
            TransportSecurity::AllowInsecureHttp
        );
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let backoff = ExponentialBackoff {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let backoff = ExponentialBackoff {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: true,
        };
        for _ in 0..32 {
            let d = backoff.delay(1);
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(250));
        }
    }

    #[test]
    fn idempotent_methods() {
        assert!(is_idempotent(&http::Method::GET));
        assert!(is_idempotent(&http::Method::PUT));
        assert!(is_idempotent(&http::Method::DELETE));
        assert!(!is_idempotent(&http::Method::POST));
        assert!(!is_idempotent(&http::Method::PATCH));
    }
}
