use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::rustls::server::{
    AllowAnyAnonymousOrAuthenticatedClient, AllowAnyAuthenticatedClient,
};
use tokio_rustls::rustls::{Certificate, PrivateKey, RootCertStore, ServerConfig};
use tokio_rustls::{server::TlsStream, TlsAcceptor};

use crate::core_tls::error::TlsError;
use crate::core_tls::tls_config::TlsConfig;

/// Server-side TLS context shared by the control-channel upgrade and the
/// data-channel wrap. Built once at startup; read-only afterwards.
pub struct TlsContext {
    acceptor: TlsAcceptor,
}

impl TlsContext {
    pub fn new(config: &TlsConfig) -> Result<Self, TlsError> {
        config.validate()?;

        let cert_chain = load_certs(&config.cert_file)
            .map_err(|e| TlsError::CertificateLoad(e.to_string()))?;
        if cert_chain.is_empty() {
            return Err(TlsError::CertificateLoad(String::from(
                "no certificate found in PEM file",
            )));
        }
        let private_key = load_private_key(&config.key_file)?;

        let builder = ServerConfig::builder().with_safe_defaults();
        let server_config = match &config.client_ca_file {
            Some(ca_file) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certs(ca_file).map_err(|e| TlsError::ClientCaLoad(e.to_string()))? {
                    roots
                        .add(&cert)
                        .map_err(|e| TlsError::ClientCaLoad(e.to_string()))?;
                }
                let verifier = if config.require_client_cert {
                    AllowAnyAuthenticatedClient::new(roots).boxed()
                } else {
                    AllowAnyAnonymousOrAuthenticatedClient::new(roots).boxed()
                };
                builder
                    .with_client_cert_verifier(verifier)
                    .with_single_cert(cert_chain, private_key)
            }
            None => builder
                .with_no_client_auth()
                .with_single_cert(cert_chain, private_key),
        }
        .map_err(|e| TlsError::Config(e.to_string()))?;

        Ok(TlsContext {
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
        })
    }

    /// Performs the server side of a TLS handshake over `stream`. Used for
    /// the control-channel AUTH TLS upgrade and for PROT P data channels in
    /// both passive and active mode.
    pub async fn accept(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>, TlsError> {
        self.acceptor
            .accept(stream)
            .await
            .map_err(|e| TlsError::Handshake(e.to_string()))
    }
}

fn load_certs(path: &std::path::Path) -> std::io::Result<Vec<Certificate>> {
    let pem = std::fs::read(path)?;
    let certs = rustls_pemfile::certs(&mut &pem[..])?;
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &std::path::Path) -> Result<PrivateKey, TlsError> {
    let pem = std::fs::read(path).map_err(|e| TlsError::PrivateKeyLoad(e.to_string()))?;

    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &pem[..])
        .map_err(|e| TlsError::PrivateKeyLoad(e.to_string()))?;
    if let Some(key) = keys.pop() {
        return Ok(PrivateKey(key));
    }

    // Fall back to the older RSA container format.
    let mut keys = rustls_pemfile::rsa_private_keys(&mut &pem[..])
        .map_err(|e| TlsError::PrivateKeyLoad(e.to_string()))?;
    match keys.pop() {
        Some(key) => Ok(PrivateKey(key)),
        None => Err(TlsError::PrivateKeyLoad(String::from(
            "no private key found in PEM file",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn context_requires_existing_files() {
        let config = TlsConfig {
            cert_file: PathBuf::from("/nonexistent/cert.pem"),
            key_file: PathBuf::from("/nonexistent/key.pem"),
            client_ca_file: None,
            require_client_cert: false,
        };
        assert!(TlsContext::new(&config).is_err());
    }

    #[test]
    fn empty_pem_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, b"").unwrap();
        std::fs::write(&key, b"").unwrap();
        let config = TlsConfig {
            cert_file: cert,
            key_file: key,
            client_ca_file: None,
            require_client_cert: false,
        };
        assert!(matches!(
            TlsContext::new(&config),
            Err(TlsError::CertificateLoad(_))
        ));
    }
}
