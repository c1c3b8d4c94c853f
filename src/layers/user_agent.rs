use crate::error::HttpError;
use http::header::{HeaderValue, USER_AGENT};
use http::Request;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that sets a default `User-Agent` header.
///
/// A header already present on the request is left untouched, so callers
/// can override the configured agent per request.
#[derive(Clone, Debug)]
pub struct UserAgentLayer {
    agent: HeaderValue,
}

impl UserAgentLayer {
    /// Create the layer from an agent string.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidHeaderValue`] if `agent` is not a valid
    /// header value.
    pub fn new(agent: &str) -> Result<Self, HttpError> {
        Ok(Self {
            agent: HeaderValue::try_from(agent)?,
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = SetUserAgent<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SetUserAgent {
            inner,
            agent: self.agent.clone(),
        }
    }
}

/// Service produced by [`UserAgentLayer`].
#[derive(Clone, Debug)]
pub struct SetUserAgent<S> {
    inner: S,
    agent: HeaderValue,
}

impl<S, B> Service<Request<B>> for SetUserAgent<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        if !request.headers().contains_key(USER_AGENT) {
            request.headers_mut().insert(USER_AGENT, self.agent.clone());
        }
        self.inner.call(request)
    }
}
