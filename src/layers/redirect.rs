//! Redirect policy with credential hygiene.
//!
//! Hop counting is delegated to tower-http's `Limited`; on top of it the
//! policy stops HTTPS to HTTP downgrades and strips `Authorization`,
//! `Cookie` and `Proxy-Authorization` once a chain leaves the original
//! origin, so caller-set credentials never travel to a third-party
//! `Location` target.

use http::{Request, Uri, header};
use tower_http::follow_redirect::policy::{Action, Attempt, Limited, Policy};

/// Headers never forwarded across origins
const SENSITIVE_HEADERS: &[header::HeaderName] = &[
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// Bounded redirect following that keeps credentials on their origin.
///
/// Cross-origin hops are followed, but sensitive headers are removed from
/// every request after the chain has crossed origins. HTTPS to HTTP
/// downgrades stop the chain; the 3xx response is returned to the caller.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    limit: Limited,
    /// Set once the chain has left the original origin
    /// (resets per request; `FollowRedirect` clones the policy)
    crossed_origin: bool,
}

impl RedirectPolicy {
    /// Policy following at most `max_redirects` hops.
    #[must_use]
    pub fn new(max_redirects: usize) -> Self {
        Self {
            limit: Limited::new(max_redirects),
            crossed_origin: false,
        }
    }

    /// Same scheme, host and port. Missing schemes count as HTTPS so
    /// cross-scheme comparisons fail closed.
    fn is_same_origin(original: &Uri, target: &Uri) -> bool {
        let original_scheme = original.scheme_str().unwrap_or("https");
        let target_scheme = target.scheme_str().unwrap_or("https");

        let original_port = original
            .port_u16()
            .unwrap_or_else(|| default_port(original_scheme));
        let target_port = target
            .port_u16()
            .unwrap_or_else(|| default_port(target_scheme));

        original_scheme == target_scheme
            && original.host().unwrap_or("") == target.host().unwrap_or("")
            && original_port == target_port
    }

    fn is_https_downgrade(original: &Uri, target: &Uri) -> bool {
        original.scheme_str().unwrap_or("https") == "https"
            && target.scheme_str().unwrap_or("https") == "http"
    }
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "http" => 80,
        "https" => 443,
        _ => 0,
    }
}

impl<B: Clone, E> Policy<B, E> for RedirectPolicy {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        if matches!(
            <Limited as Policy<B, E>>::redirect(&mut self.limit, attempt)?,
            Action::Stop
        ) {
            return Ok(Action::Stop);
        }

        let original = attempt.previous();
        let target = attempt.location();

        if Self::is_https_downgrade(original, target) {
            tracing::warn!(
                original = %original,
                target = %target,
                "stopping HTTPS to HTTP downgrade redirect"
            );
            return Ok(Action::Stop);
        }

        if !Self::is_same_origin(original, target) {
            self.crossed_origin = true;
            tracing::debug!(
                original = %original,
                target = %target,
                "redirect leaves the original origin"
            );
        }

        Ok(Action::Follow)
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        if self.crossed_origin {
            let headers = request.headers_mut();
            for name in SENSITIVE_HEADERS {
                if headers.remove(name).is_some() {
                    tracing::debug!(
                        header = %name,
                        "stripped sensitive header on cross-origin redirect"
                    );
                }
            }
        }
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        // 307/308 re-send the body
        Some(body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn same_origin_matches_scheme_host_and_port() {
        assert!(RedirectPolicy::is_same_origin(
            &uri("https://example.com/a"),
            &uri("https://example.com/b")
        ));
        assert!(!RedirectPolicy::is_same_origin(
            &uri("https://example.com/a"),
            &uri("https://other.com/b")
        ));
        assert!(!RedirectPolicy::is_same_origin(
            &uri("https://example.com/a"),
            &uri("http://example.com/b")
        ));
        assert!(!RedirectPolicy::is_same_origin(
            &uri("https://example.com/a"),
            &uri("https://example.com:8443/b")
        ));
    }

    #[test]
    fn explicit_default_port_is_same_origin() {
        assert!(RedirectPolicy::is_same_origin(
            &uri("https://example.com/a"),
            &uri("https://example.com:443/b")
        ));
        assert!(RedirectPolicy::is_same_origin(
            &uri("http://example.com/a"),
            &uri("http://example.com:80/b")
        ));
    }

    #[test]
    fn downgrade_detection() {
        assert!(RedirectPolicy::is_https_downgrade(
            &uri("https://example.com/a"),
            &uri("http://example.com/b")
        ));
        // upgrades and like-for-like hops are fine
        assert!(!RedirectPolicy::is_https_downgrade(
            &uri("http://example.com/a"),
            &uri("https://example.com/b")
        ));
        assert!(!RedirectPolicy::is_https_downgrade(
            &uri("https://example.com/a"),
            &uri("https://other.com/b")
        ));
    }

    fn credentialed_request() -> Request<()> {
        Request::builder()
            .uri("https://example.com/a")
            .header("authorization", "Bearer token")
            .header("cookie", "sid=1")
            .header("x-request-id", "abc")
            .body(())
            .unwrap()
    }

    #[test]
    fn sensitive_headers_stripped_after_crossing_origins() {
        let mut policy = RedirectPolicy::new(5);
        policy.crossed_origin = true;

        let mut request = credentialed_request();
        <RedirectPolicy as Policy<(), Infallible>>::on_request(&mut policy, &mut request);

        assert!(request.headers().get("authorization").is_none());
        assert!(request.headers().get("cookie").is_none());
        assert_eq!(
            request.headers().get("x-request-id").map(|v| v.as_bytes()),
            Some(&b"abc"[..])
        );
    }

    #[test]
    fn headers_kept_while_on_the_original_origin() {
        let mut policy = RedirectPolicy::new(5);

        let mut request = credentialed_request();
        <RedirectPolicy as Policy<(), Infallible>>::on_request(&mut policy, &mut request);

        assert!(request.headers().get("authorization").is_some());
        assert!(request.headers().get("cookie").is_some());
    }
}
