use std::path::PathBuf;

use crate::config::SecurityConfig;
use crate::core_tls::error::TlsError;

/// Filesystem inputs for the server TLS context.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    /// CA bundle used to verify client certificates, when present.
    pub client_ca_file: Option<PathBuf>,
    pub require_client_cert: bool,
}

impl TlsConfig {
    /// Extracts the TLS inputs from the security section. Returns `None`
    /// when no certificate is configured (the server then runs without
    /// FTPS support).
    pub fn from_security(security: &SecurityConfig) -> Option<TlsConfig> {
        if security.ssl_cert_file.as_os_str().is_empty()
            || security.ssl_key_file.as_os_str().is_empty()
        {
            return None;
        }
        let client_ca_file = if !security.ssl_client_ca_file.as_os_str().is_empty() {
            Some(security.ssl_client_ca_file.clone())
        } else if !security.ssl_ca_file.as_os_str().is_empty() {
            Some(security.ssl_ca_file.clone())
        } else {
            None
        };
        Some(TlsConfig {
            cert_file: security.ssl_cert_file.clone(),
            key_file: security.ssl_key_file.clone(),
            client_ca_file,
            require_client_cert: security.require_client_cert,
        })
    }

    pub fn validate(&self) -> Result<(), TlsError> {
        if !self.cert_file.exists() {
            return Err(TlsError::CertificateLoad(format!(
                "Certificate file not found: {}",
                self.cert_file.display()
            )));
        }
        if !self.key_file.exists() {
            return Err(TlsError::PrivateKeyLoad(format!(
                "Private key file not found: {}",
                self.key_file.display()
            )));
        }
        if let Some(ca) = &self.client_ca_file {
            if !ca.exists() {
                return Err(TlsError::ClientCaLoad(format!(
                    "CA bundle not found: {}",
                    ca.display()
                )));
            }
        }
        if self.require_client_cert && self.client_ca_file.is_none() {
            return Err(TlsError::Config(String::from(
                "require_client_cert is set but no client CA bundle is configured",
            )));
        }
        Ok(())
    }
}
