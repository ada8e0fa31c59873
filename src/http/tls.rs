//! Server identity and client trust.
//!
//! Builds the rustls server configuration from three PEM files: the server certificate
//! chain, its private key, and a CA certificate that is added to the default roots to
//! form the client trust store. Everything is loaded once at startup; the result is
//! immutable and shared by every connection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::{ClientAuthMode, TlsPaths};

/// The file a configuration error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    ServerCertificate,
    ServerKey,
    CaCertificate,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::ServerCertificate => f.write_str("server certificate"),
            Artifact::ServerKey => f.write_str("server key"),
            Artifact::CaCertificate => f.write_str("CA certificate"),
        }
    }
}

/// TLS configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to read {artifact} from {}: {source}", .path.display())]
    Read {
        artifact: Artifact,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {artifact} from {}: {reason}", .path.display())]
    Parse {
        artifact: Artifact,
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to configure TLS protocol versions: {0}")]
    Protocol(rustls::Error),

    #[error("Server certificate and key are not usable together: {0}")]
    Identity(rustls::Error),

    #[error("Failed to build client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

impl ConfigurationError {
    /// The file that could not be loaded, when the failure is tied to one.
    pub fn artifact(&self) -> Option<Artifact> {
        match self {
            ConfigurationError::Read { artifact, .. }
            | ConfigurationError::Parse { artifact, .. } => Some(*artifact),
            ConfigurationError::Identity(_) => Some(Artifact::ServerKey),
            ConfigurationError::Verifier(_) => Some(Artifact::CaCertificate),
            ConfigurationError::Protocol(_) => None,
        }
    }
}

/// Build the server TLS configuration.
///
/// The trust store is always loaded, even when `client_auth` is `None`, so that a
/// broken CA file is caught at startup regardless of policy.
pub fn build_server_config(
    paths: &TlsPaths,
    client_auth: ClientAuthMode,
) -> Result<Arc<ServerConfig>, ConfigurationError> {
    let certs = load_certs(&paths.cert, Artifact::ServerCertificate)?;
    let key = load_key(&paths.key)?;
    let roots = load_trust_store(&paths.ca_cert)?;

    tracing::debug!(
        chain_len = certs.len(),
        trust_anchors = roots.len(),
        ?client_auth,
        "Loaded TLS identity and client trust store"
    );

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(ConfigurationError::Protocol)?;

    let builder = match client_auth {
        ClientAuthMode::None => builder.with_no_client_auth(),
        ClientAuthMode::Request => {
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .allow_unauthenticated()
                .build()?;
            builder.with_client_cert_verifier(verifier)
        }
        ClientAuthMode::Require => {
            let verifier =
                WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider).build()?;
            builder.with_client_cert_verifier(verifier)
        }
    };

    let mut config = builder
        .with_single_cert(certs, key)
        .map_err(ConfigurationError::Identity)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn read_file(path: &Path, artifact: Artifact) -> Result<Vec<u8>, ConfigurationError> {
    std::fs::read(path).map_err(|source| ConfigurationError::Read {
        artifact,
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(path: &Path, artifact: Artifact, reason: impl ToString) -> ConfigurationError {
    ConfigurationError::Parse {
        artifact,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_certs(
    path: &Path,
    artifact: Artifact,
) -> Result<Vec<CertificateDer<'static>>, ConfigurationError> {
    let pem = read_file(path, artifact)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_error(path, artifact, e))?;

    if certs.is_empty() {
        return Err(parse_error(path, artifact, "no certificates found"));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigurationError> {
    let pem = read_file(path, Artifact::ServerKey)?;
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| parse_error(path, Artifact::ServerKey, e))
}

/// Default roots plus every certificate in the CA file.
fn load_trust_store(path: &Path) -> Result<RootCertStore, ConfigurationError> {
    let mut roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    for cert in load_certs(path, Artifact::CaCertificate)? {
        roots
            .add(cert)
            .map_err(|e| parse_error(path, Artifact::CaCertificate, e))?;
    }
    Ok(roots)
}
