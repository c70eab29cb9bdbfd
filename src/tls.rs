//! TLS Setup
//!
//! Loads the inbound certificate/key pair into a [`TlsAcceptor`] and builds the
//! rustls client configuration used for `wss` dials. Everything here runs once
//! at startup; any failure is fatal to the process.

use crate::config::{Config, TlsConfig};
use crate::Result;
use anyhow::{anyhow, Context};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::Connector;
use tracing::{debug, info};

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Read every certificate from a PEM file
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open certificate file: {}", path.display()))?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificate file: {}", path.display()))?;

    if certs.is_empty() {
        return Err(anyhow!("No certificates found in {}", path.display()));
    }

    debug!("Loaded {} certificate(s) from {}", certs.len(), path.display());
    Ok(certs)
}

/// Read the first private key (PKCS#8, PKCS#1 or SEC1) from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open private key file: {}", path.display()))?;

    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to parse private key file: {}", path.display()))?
        .ok_or_else(|| anyhow!("No private key found in {}", path.display()))
}

/// Build the inbound TLS acceptor from the configured certificate and key
pub fn load_tls_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor> {
    let certs = load_certificates(&tls.certificate_path)?;
    let key = load_private_key(&tls.private_key_path)?;

    let mut server_config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .context("Failed to select TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Certificate and private key do not form a valid pair")?;
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    info!(
        "Loaded TLS certificate {} and key {}",
        tls.certificate_path.display(),
        tls.private_key_path.display()
    );
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Connector for `wss` dials: webpki roots plus any extra configured anchors
pub fn upstream_connector(extra_roots: Option<&Path>) -> Result<Connector> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = extra_roots {
        for cert in load_certificates(path)? {
            roots
                .add(cert)
                .with_context(|| format!("Invalid trust anchor in {}", path.display()))?;
        }
        info!("Trusting additional upstream CA certificates from {}", path.display());
    }

    let client_config = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .context("Failed to select TLS protocol versions")?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Connector::Rustls(Arc::new(client_config)))
}

/// Connector for the configured target; `None` means a plain `ws` dial
pub fn connector_for(config: &Config) -> Result<Option<Connector>> {
    if config.tls_enabled() {
        upstream_connector(config.target.ca_path.as_deref()).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            pem_file(&certified.cert.pem()),
            pem_file(&certified.key_pair.serialize_pem()),
        )
    }

    #[test]
    fn test_load_valid_pair() {
        let (cert, key) = self_signed();
        let tls = TlsConfig {
            certificate_path: cert.path().to_path_buf(),
            private_key_path: key.path().to_path_buf(),
        };
        assert!(load_tls_acceptor(&tls).is_ok());
    }

    #[test]
    fn test_missing_certificate_file_fails() {
        let (_, key) = self_signed();
        let tls = TlsConfig {
            certificate_path: "/nonexistent/cert.pem".into(),
            private_key_path: key.path().to_path_buf(),
        };
        match load_tls_acceptor(&tls) {
            Ok(_) => panic!("missing certificate must be fatal"),
            Err(e) => assert!(e.to_string().contains("Failed to open certificate file")),
        }
    }

    #[test]
    fn test_empty_files_are_rejected() {
        let empty = pem_file("");
        assert!(load_certificates(empty.path()).is_err());
        assert!(load_private_key(empty.path()).is_err());
    }

    #[test]
    fn test_connector_only_with_tls() {
        let mut config = Config::default();
        assert!(connector_for(&config).unwrap().is_none());

        let (cert, key) = self_signed();
        config.tls = Some(TlsConfig {
            certificate_path: cert.path().to_path_buf(),
            private_key_path: key.path().to_path_buf(),
        });
        config.target.ca_path = Some(cert.path().to_path_buf());
        assert!(matches!(connector_for(&config).unwrap(), Some(Connector::Rustls(_))));
    }
}
