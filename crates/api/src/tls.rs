//! TLS listener setup.

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::CryptoProvider;

use crate::config::TlsFiles;

/// Pin aws-lc-rs as the process-wide rustls backend.
///
/// Both the ring and aws-lc-rs backends are linked into this binary, so rustls
/// cannot choose one by itself. Must run before any server config is built.
/// Calling it again after a provider is installed does nothing.
pub fn install_crypto_provider() {
    if CryptoProvider::get_default().is_some() {
        return;
    }
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        // Another installer won the race.
        tracing::warn!("rustls crypto provider was already installed");
    }
}

/// Load the certificate chain and private key for the listener.
pub async fn load(files: &TlsFiles) -> anyhow::Result<RustlsConfig> {
    install_crypto_provider();
    RustlsConfig::from_pem_file(&files.cert, &files.key)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS pair {:?}: {e}", files.cert))
}
