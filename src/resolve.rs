//! Request path resolution.
//!
//! A [`UriResolver`] turns the optional per-request path into the absolute
//! `http::Uri` handed to the transport. [`AbsoluteResolver`] passes fully
//! qualified URLs through; [`RelativeResolver`] resolves references against
//! a configured base URL, optionally splicing a mount context in front of
//! host-absolute paths.

use crate::error::{HttpError, InvalidUriKind};
use http::Uri;
use url::Url;

/// Maps an optional request path to an absolute request URI.
pub trait UriResolver: Send + Sync + std::fmt::Debug {
    /// Resolve `path` to the URI the request is sent to.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when the path is missing but required, or when
    /// it cannot be resolved to a valid absolute URI.
    fn resolve(&self, path: Option<&str>) -> Result<Uri, HttpError>;
}

/// Resolver that accepts only fully qualified URLs.
///
/// This is the default for clients built without a base URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsoluteResolver;

impl UriResolver for AbsoluteResolver {
    fn resolve(&self, path: Option<&str>) -> Result<Uri, HttpError> {
        let raw = path.ok_or(HttpError::PathRequired("AbsoluteResolver"))?;
        let raw = raw.trim();
        let uri: Uri = raw.parse().map_err(|e: http::uri::InvalidUri| {
            HttpError::InvalidUri {
                url: raw.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            }
        })?;
        if uri.scheme().is_none() {
            return Err(HttpError::InvalidUri {
                url: raw.to_owned(),
                kind: InvalidUriKind::MissingScheme,
                reason: "absolute URL required".to_owned(),
            });
        }
        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: raw.to_owned(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host".to_owned(),
            });
        }
        Ok(uri)
    }
}

/// Resolver that interprets request paths relative to a base URL.
///
/// The base is normalized at construction: surrounding whitespace is
/// trimmed and one trailing `/` is dropped, so `https://h/a/` and
/// `https://h/a` configure the same resolver.
///
/// Resolution rules for `resolve(path)`:
///
/// * `None` — the normalized base, verbatim.
/// * A fully qualified URL — used as-is (the input wins over the base).
/// * A path not starting with `/` — resolved against the deepest base
///   path segment: base `https://h/a/b` plus `x.html` gives
///   `https://h/a/b/x.html`. The empty path gives `https://h/a/b/`.
/// * A path starting with `/` — spliced onto the mount context: with
///   context `/a`, path `/x.html` gives `https://h/a/x.html`. Without a
///   context the path is resolved from the host root.
///
/// The mount context must be a prefix of the base path (segment-aligned);
/// this is checked at construction.
#[derive(Debug, Clone)]
pub struct RelativeResolver {
    /// Normalized base, kept verbatim for `resolve(None)`
    base: Uri,
    /// Same base as a `url::Url`, the anchor for reference resolution
    base_url: Url,
    /// Path component of the normalized base string ("" for a bare host)
    base_path: String,
    /// Normalized mount context ("" when the context is the root)
    context: String,
}

impl RelativeResolver {
    /// Create a resolver anchored at `base` with the root mount context.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidConfig`] when `base` is not an absolute
    /// URL.
    pub fn new(base: &str) -> Result<Self, HttpError> {
        Self::with_context(base, "/")
    }

    /// Create a resolver anchored at `base`, splicing host-absolute request
    /// paths onto `context`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidConfig`] when `base` is not an absolute
    /// URL or when its path does not live under `context`.
    pub fn with_context(base: &str, context: &str) -> Result<Self, HttpError> {
        let base = normalize_base(base)?;
        let context = normalize_context(context);

        let base_url = Url::parse(&base).map_err(|e| {
            HttpError::invalid_config(format!("invalid base URL '{base}': {e}"))
        })?;
        let base_uri: Uri = base.parse().map_err(|e: http::uri::InvalidUri| {
            HttpError::invalid_config(format!("invalid base URL '{base}': {e}"))
        })?;

        // Path taken from the normalized string, not from Url: a bare host
        // has the empty path here, while Url reports "/".
        let authority_start = base.find("://").map_or(0, |i| i + 3);
        let base_path = base[authority_start..]
            .find('/')
            .map_or_else(String::new, |i| base[authority_start + i..].to_owned());

        if !(base_path == context || base_path.starts_with(&format!("{context}/"))) {
            return Err(HttpError::invalid_config(format!(
                "base path '{base_path}' of '{base}' is outside mount context '{context}/'"
            )));
        }

        Ok(Self {
            base: base_uri,
            base_url,
            base_path,
            context,
        })
    }
}

/// Trim, require `://` past the first byte, drop one trailing `/`.
fn normalize_base(base: &str) -> Result<String, HttpError> {
    let base = base.trim();
    match base.find("://") {
        Some(i) if i >= 1 => {}
        _ => {
            return Err(HttpError::invalid_config(format!(
                "base URL '{base}' must be absolute (scheme://host...)"
            )));
        }
    }
    let base = base.strip_suffix('/').unwrap_or(base);
    Ok(base.to_owned())
}

/// Trim, ensure a leading `/`, drop one trailing `/`.
///
/// The root context `/` normalizes to the empty string so that splicing
/// never produces a `//` network-path reference.
fn normalize_context(context: &str) -> String {
    let context = context.trim();
    let context = if context.starts_with('/') {
        context.to_owned()
    } else {
        format!("/{context}")
    };
    context.strip_suffix('/').unwrap_or(&context).to_owned()
}

impl UriResolver for RelativeResolver {
    fn resolve(&self, path: Option<&str>) -> Result<Uri, HttpError> {
        let Some(path) = path else {
            return Ok(self.base.clone());
        };
        let path = path.trim();

        // A fully qualified URL wins over the base.
        let reference = if Url::parse(path).is_ok() {
            path.to_owned()
        } else if path.starts_with('/') {
            format!("{}{path}", self.context)
        } else {
            format!("{}/{path}", self.base_path)
        };

        let resolved = self.base_url.join(&reference).map_err(|e| {
            HttpError::InvalidUri {
                url: path.to_owned(),
                kind: InvalidUriKind::ResolveError,
                reason: e.to_string(),
            }
        })?;

        let resolved = String::from(resolved);
        resolved
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                url: resolved.clone(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })
    }
}
