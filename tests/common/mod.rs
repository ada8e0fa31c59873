//! Shared fixtures: a throwaway PKI, servers on ephemeral ports, and TLS clients.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair,
};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use mutating_admission::config::{ClientAuthMode, TlsPaths};
use mutating_admission::http::{build_server_config, ServerError, ShutdownTrigger, WebhookServer};
use mutating_admission::mutate::{MutateError, Mutator};
use mutating_admission::routes::create_router;
use mutating_admission::state::WebhookState;

/// A CA, a server certificate for `localhost`, and client identities.
pub struct TestPki {
    _dir: TempDir,
    pub paths: TlsPaths,
    pub ca_pem: String,
    /// Client certificate and key issued by the CA, as one PEM bundle
    pub client_identity: String,
    /// Client certificate and key from an unrelated CA
    pub rogue_identity: String,
}

fn new_ca(name: &str) -> (Certificate, KeyPair) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key).unwrap();
    (cert, key)
}

fn issue(
    name: &str,
    usage: ExtendedKeyUsagePurpose,
    ca: &Certificate,
    ca_key: &KeyPair,
) -> (Certificate, KeyPair) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, name);
    params.extended_key_usages = vec![usage];
    let cert = params.signed_by(&key, ca, ca_key).unwrap();
    (cert, key)
}

impl TestPki {
    pub fn generate() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let (ca, ca_key) = new_ca("test webhook CA");
        let (server, server_key) =
            issue("localhost", ExtendedKeyUsagePurpose::ServerAuth, &ca, &ca_key);
        let (client, client_key) =
            issue("kube-apiserver", ExtendedKeyUsagePurpose::ClientAuth, &ca, &ca_key);

        let (rogue_ca, rogue_ca_key) = new_ca("somebody else");
        let (rogue, rogue_key) = issue(
            "kube-apiserver",
            ExtendedKeyUsagePurpose::ClientAuth,
            &rogue_ca,
            &rogue_ca_key,
        );

        let paths = TlsPaths {
            cert: dir.path().join("tls.crt"),
            key: dir.path().join("tls.key"),
            ca_cert: dir.path().join("ca.crt"),
        };
        std::fs::write(&paths.cert, server.pem()).unwrap();
        std::fs::write(&paths.key, server_key.serialize_pem()).unwrap();
        std::fs::write(&paths.ca_cert, ca.pem()).unwrap();

        Self {
            _dir: dir,
            paths,
            ca_pem: ca.pem(),
            client_identity: format!("{}{}", client.pem(), client_key.serialize_pem()),
            rogue_identity: format!("{}{}", rogue.pem(), rogue_key.serialize_pem()),
        }
    }

    /// A client that trusts the test CA and optionally presents `identity`.
    pub fn client(&self, addr: SocketAddr, identity: Option<&str>) -> reqwest::Client {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .add_root_certificate(reqwest::Certificate::from_pem(self.ca_pem.as_bytes()).unwrap())
            .resolve("localhost", addr)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .timeout(Duration::from_secs(10));

        if let Some(identity) = identity {
            builder = builder.identity(reqwest::Identity::from_pem(identity.as_bytes()).unwrap());
        }
        builder.build().unwrap()
    }

    /// A bare TLS connection trusting the test CA, for writing raw HTTP bytes.
    pub async fn tls_stream(&self, addr: SocketAddr) -> TlsStream<TcpStream> {
        let mut roots = rustls::RootCertStore::empty();
        roots
            .add(CertificateDer::from_pem_slice(self.ca_pem.as_bytes()).unwrap())
            .unwrap();
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

        let tcp = TcpStream::connect(addr).await.unwrap();
        TlsConnector::from(Arc::new(config))
            .connect(ServerName::try_from("localhost").unwrap(), tcp)
            .await
            .unwrap()
    }
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("https://localhost:{}{}", addr.port(), path)
}

/// A server running on an ephemeral loopback port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: ShutdownTrigger,
    pub task: JoinHandle<Result<(), ServerError>>,
}

pub fn bind(
    pki: &TestPki,
    mutator: Arc<dyn Mutator>,
    client_auth: ClientAuthMode,
    drain: Duration,
) -> (WebhookServer, axum::Router) {
    let tls = build_server_config(&pki.paths, client_auth).unwrap();
    let server =
        WebhookServer::bind_with("127.0.0.1:0".parse().unwrap(), tls, drain).unwrap();
    let app = create_router(WebhookState::new(mutator, false), Duration::from_secs(10));
    (server, app)
}

/// Bind and serve without OS signal handling; drive shutdown via `shutdown`.
pub fn start(
    pki: &TestPki,
    mutator: Arc<dyn Mutator>,
    client_auth: ClientAuthMode,
    drain: Duration,
) -> RunningServer {
    let (server, app) = bind(pki, mutator, client_auth, drain);
    RunningServer {
        addr: server.local_addr(),
        shutdown: server.shutdown_trigger(),
        task: tokio::spawn(server.serve(app)),
    }
}

/// Returns its input unchanged
pub struct Echo;

#[async_trait]
impl Mutator for Echo {
    async fn mutate(&self, payload: &[u8], _verbose: bool) -> Result<Vec<u8>, MutateError> {
        Ok(payload.to_vec())
    }
}

/// Always fails
pub struct Fail;

#[async_trait]
impl Mutator for Fail {
    async fn mutate(&self, _payload: &[u8], _verbose: bool) -> Result<Vec<u8>, MutateError> {
        Err(MutateError::Failed("upstream policy engine unreachable".into()))
    }
}

/// Signals `entered` on each call, then echoes after `delay`, or never when `delay` is `None`
pub struct Slow {
    pub entered: Arc<Notify>,
    pub delay: Option<Duration>,
}

impl Slow {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            delay,
        }
    }
}

#[async_trait]
impl Mutator for Slow {
    async fn mutate(&self, payload: &[u8], _verbose: bool) -> Result<Vec<u8>, MutateError> {
        self.entered.notify_one();
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
        Ok(payload.to_vec())
    }
}
