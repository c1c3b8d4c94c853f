use crate::config::{is_idempotent, ExponentialBackoff, RetryConfig};
use crate::error::HttpError;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use tower::retry::Policy;

/// Retry policy for `tower::retry`.
///
/// Retries only transport and timeout failures, only for idempotent
/// methods, with exponential backoff between attempts. Error status
/// codes never trigger a retry here; they are surfaced to the decoding
/// layer as responses.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    remaining: u32,
    attempt: u32,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub(crate) fn new(config: &RetryConfig) -> Self {
        Self {
            remaining: config.max_retries,
            attempt: 0,
            backoff: config.backoff.clone(),
        }
    }
}

impl<ResBody> Policy<Request<Full<Bytes>>, Response<ResBody>, HttpError> for RetryPolicy {
    type Future = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn retry(
        &mut self,
        request: &mut Request<Full<Bytes>>,
        result: &mut Result<Response<ResBody>, HttpError>,
    ) -> Option<Self::Future> {
        let error = match result {
            Ok(_) => return None,
            Err(e) => e,
        };
        if self.remaining == 0 || !error.is_retryable() || !is_idempotent(request.method()) {
            return None;
        }
        self.remaining -= 1;
        let delay = self.backoff.delay(self.attempt);
        self.attempt += 1;
        tracing::warn!(
            method = %request.method(),
            uri = %request.uri(),
            remaining = self.remaining,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "retrying request"
        );
        Some(Box::pin(tokio::time::sleep(delay)))
    }

    fn clone_request(&mut self, request: &Request<Full<Bytes>>) -> Option<Request<Full<Bytes>>> {
        if !is_idempotent(request.method()) {
            return None;
        }
        // http::Request is not Clone; rebuild it field by field.
        let mut clone = Request::new(request.body().clone());
        *clone.method_mut() = request.method().clone();
        *clone.uri_mut() = request.uri().clone();
        *clone.version_mut() = request.version();
        *clone.headers_mut() = request.headers().clone();
        Some(clone)
    }
}
