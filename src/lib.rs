//! HTTP client construction with relative URI resolution and typed
//! response dispatch.
//!
//! Built on hyper + tower: a pooled [`hyper_util`] legacy client wrapped
//! in timeout, user-agent, redirect and retry middleware, exposed through
//! a `Clone + Send + Sync` handle.
//!
//! What this crate adds on top of the transport:
//!
//! * **URI resolution** — clients are built either for fully qualified
//!   URLs ([`AbsoluteResolver`]) or anchored at a base URL
//!   ([`RelativeResolver`]), with an optional mount context that
//!   host-absolute request paths are spliced onto.
//! * **Typed responses** — a [`DecoderRegistry`] maps result types to
//!   [`ResponseDecoder`]s; [`RequestBuilder::fetch`] looks the decoder up
//!   before the request is sent and fails fast when none is registered.
//!   All provided decoders share one status gate: statuses of 300 and
//!   above become [`HttpError::Status`] after the body has been drained,
//!   unless the decoder opts into decoding error bodies.
//!
//! # Example
//!
//! ```ignore
//! use waypoint_http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .base_url("https://api.example.com/v1")
//!     .build()?;
//!
//! // "status" resolves to https://api.example.com/v1/status
//! let status: String = client.get("status").fetch().await?;
//! ```

mod builder;
mod client;
mod config;
mod decode;
mod error;
mod layers;
mod registry;
mod request;
mod resolve;
mod response;
mod tls;

pub use builder::ClientBuilder;
pub use client::HttpClient;
pub use config::{
    ClientConfig, DEFAULT_USER_AGENT, ExponentialBackoff, RetryConfig, TlsRoots,
    TransportSecurity, is_idempotent,
};
pub use decode::{BytesDecoder, JsonDecoder, ResponseDecoder, TextDecoder};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{RedirectPolicy, RetryPolicy, UserAgentLayer};
pub use registry::DecoderRegistry;
pub use request::RequestBuilder;
pub use resolve::{AbsoluteResolver, RelativeResolver, UriResolver};
pub use response::{HttpResponse, ResponseBody};
