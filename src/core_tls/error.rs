use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to load SSL certificate: {0}")]
    CertificateLoad(String),

    #[error("Failed to load SSL private key: {0}")]
    PrivateKeyLoad(String),

    #[error("Failed to load client CA bundle: {0}")]
    ClientCaLoad(String),

    #[error("TLS configuration error: {0}")]
    Config(String),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("TLS not configured")]
    NotConfigured,
}
