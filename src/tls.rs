//! TLS connector construction.
//!
//! The crypto provider (aws-lc-rs) and the native root store are process-wide
//! and cached; connector builders clone from the cache.

use crate::config::{TlsRoots, TransportSecurity};
use crate::error::HttpError;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::RootCertStore;
use std::sync::{Arc, OnceLock};

fn crypto_provider() -> &'static Arc<rustls::crypto::CryptoProvider> {
    static PROVIDER: OnceLock<Arc<rustls::crypto::CryptoProvider>> = OnceLock::new();
    PROVIDER.get_or_init(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Load the OS trust store once and cache it for the process lifetime.
fn native_root_store() -> Result<&'static RootCertStore, HttpError> {
    static ROOTS: OnceLock<Result<RootCertStore, String>> = OnceLock::new();
    ROOTS
        .get_or_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                tracing::warn!(error = %err, "failed to load a native root certificate");
            }
            let mut store = RootCertStore::empty();
            let (added, ignored) = store.add_parsable_certificates(loaded.certs);
            if ignored > 0 {
                tracing::warn!(ignored, "skipped unparsable native root certificates");
            }
            if added == 0 {
                return Err("no usable native root certificates found".to_owned());
            }
            Ok(store)
        })
        .as_ref()
        .map_err(|reason| HttpError::Tls(reason.clone()))
}

/// Build the hyper-rustls connector for the configured roots and
/// transport security mode.
pub(crate) fn build_https_connector(
    roots: TlsRoots,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = HttpsConnectorBuilder::new();

    let with_tls = match roots {
        TlsRoots::Webpki => builder
            .with_provider_and_webpki_roots(crypto_provider().clone())
            .map_err(|e| HttpError::Tls(e.to_string()))?,
        TlsRoots::Native => {
            let tls_config =
                rustls::ClientConfig::builder_with_provider(crypto_provider().clone())
                    .with_safe_default_protocol_versions()
                    .map_err(|e| HttpError::Tls(e.to_string()))?
                    .with_root_certificates(native_root_store()?.clone())
                    .with_no_client_auth();
            builder.with_tls_config(tls_config)
        }
    };

    let with_scheme = match transport {
        TransportSecurity::TlsOnly => with_tls.https_only(),
        TransportSecurity::AllowInsecureHttp => {
            tracing::warn!("transport security allows plain HTTP");
            with_tls.https_or_http()
        }
    };

    Ok(with_scheme.enable_http1().enable_http2().build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webpki_connector_builds() {
        let connector = build_https_connector(TlsRoots::Webpki, TransportSecurity::TlsOnly);
        assert!(connector.is_ok());
    }

    #[test]
    fn insecure_mode_connector_builds() {
        let connector =
            build_https_connector(TlsRoots::Webpki, TransportSecurity::AllowInsecureHttp);
        assert!(connector.is_ok());
    }
}
