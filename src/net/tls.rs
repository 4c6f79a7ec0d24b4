//! TLS configuration and certificate loading.
//!
//! # Design Decisions
//! - TLS 1.2 minimum, forward-secret AEAD suites only
//! - Key exchange limited to P-384, P-256 and X25519
//! - The key must match the certificate; a mismatch fails before any bind
//! - Certificates are consumed, never issued or rotated here

use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::{aws_lc_rs, CryptoProvider};
use rustls::ServerConfig;
use thiserror::Error;

/// Certificate chain and private key, PEM encoded.
#[derive(Clone)]
pub struct Certificate {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed PEM data: {0}")]
    Pem(#[source] io::Error),

    #[error("no certificate found in PEM data")]
    NoCertificate,

    #[error("no private key found in PEM data")]
    NoPrivateKey,

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

/// Certificate collaborator, asked once each time the secure listener starts.
pub trait CertificateSource: Send + Sync {
    fn fetch(&self) -> Result<Certificate, CertificateError>;
}

impl CertificateSource for Certificate {
    fn fetch(&self) -> Result<Certificate, CertificateError> {
        Ok(self.clone())
    }
}

/// Certificate and key read from PEM files.
#[derive(Debug, Clone)]
pub struct FileCertificateSource {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl FileCertificateSource {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CertificateError> {
    std::fs::read(path).map_err(|source| CertificateError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl CertificateSource for FileCertificateSource {
    fn fetch(&self) -> Result<Certificate, CertificateError> {
        Ok(Certificate {
            cert_pem: read(&self.cert_path)?,
            key_pem: read(&self.key_path)?,
        })
    }
}

fn provider() -> CryptoProvider {
    use aws_lc_rs::cipher_suite::*;
    use aws_lc_rs::kx_group;

    CryptoProvider {
        cipher_suites: vec![
            TLS13_AES_256_GCM_SHA384,
            TLS13_AES_128_GCM_SHA256,
            TLS13_CHACHA20_POLY1305_SHA256,
            TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        ],
        kx_groups: vec![kx_group::SECP384R1, kx_group::SECP256R1, kx_group::X25519],
        ..aws_lc_rs::default_provider()
    }
}

/// Build the rustls server configuration for `certificate`.
pub fn server_config(certificate: &Certificate) -> Result<Arc<ServerConfig>, CertificateError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(certificate.cert_pem.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(CertificateError::Pem)?;
    if certs.is_empty() {
        return Err(CertificateError::NoCertificate);
    }
    let key = rustls_pemfile::private_key(&mut BufReader::new(certificate.key_pem.as_slice()))
        .map_err(CertificateError::Pem)?
        .ok_or(CertificateError::NoPrivateKey)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
