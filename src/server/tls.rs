//! TLS acceptor built from PEM files.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use rustls::server::WebPkiClientVerifier;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

/// Reads the certificate chain, private key and optional client CA bundle
/// named by `tls` and builds an acceptor from them.
pub fn load_tls_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor> {
    let cert_path = tls.cert_path.as_deref().context("tls.cert_path is not set")?;
    let key_path = tls.key_path.as_deref().context("tls.key_path is not set")?;

    let cert_pem = read_pem(cert_path, "certificate")?;
    let key_pem = read_pem(key_path, "private key")?;
    let client_ca_pem = if tls.client_cert_required {
        let ca_path = tls
            .client_ca_path
            .as_deref()
            .context("tls.client_ca_path is not set")?;
        Some(read_pem(ca_path, "client CA bundle")?)
    } else {
        None
    };

    let config = server_config_from_pem(&cert_pem, &key_pem, client_ca_pem.as_deref())?;
    tracing::info!(
        cert = %cert_path.display(),
        client_auth = tls.client_cert_required,
        "TLS enabled"
    );
    Ok(TlsAcceptor::from(config))
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {} {}", what, path.display()))
}

/// Creates a rustls server config from PEM encoded material. When
/// `client_ca_pem` is given, clients must present a certificate it signed.
pub fn server_config_from_pem(
    cert_pem: &[u8],
    key_pem: &[u8],
    client_ca_pem: Option<&[u8]>,
) -> Result<Arc<rustls::ServerConfig>> {
    let certs = parse_certs(cert_pem).context("failed to parse certificate PEM")?;
    if certs.is_empty() {
        bail!("no certificates found in PEM");
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .context("failed to parse private key PEM")?
        .ok_or_else(|| anyhow!("no private key found in PEM"))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .context("failed to select TLS protocol versions")?;

    let builder = match client_ca_pem {
        Some(ca_pem) => {
            let mut roots = RootCertStore::empty();
            for cert in parse_certs(ca_pem).context("failed to parse client CA PEM")? {
                roots.add(cert).context("invalid client CA certificate")?;
            }
            if roots.is_empty() {
                bail!("no certificates found in client CA PEM");
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .context("failed to build client certificate verifier")?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let config = builder
        .with_single_cert(certs, key)
        .context("failed to create rustls server config")?;

    Ok(Arc::new(config))
}

fn parse_certs(pem: &[u8]) -> std::io::Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut &pem[..]).collect()
}
