//! Security Credential Generation
//!
//! Daraja operations that move money on behalf of an API operator (B2C, B2B,
//! balance, status, reversal) require a `SecurityCredential`: the initiator
//! password encrypted with Safaricom's public certificate using RSA PKCS#1
//! v1.5 padding, then base64 encoded. This is an encrypt-only step; no
//! private key is ever involved.
//!
//! # Certificate selection
//!
//! ```text
//! environment ──▶ configured path exists? ──yes──▶ read file
//!                          │
//!                          no
//!                          ▼
//!                  bundled certificate
//! ```
//!
//! The bundled certificates under `certs/` are compiled in so the codec
//! always has a fallback. Replace them with the certificates published on
//! the Daraja portal, or configure `MPESA_SANDBOX_CERT` /
//! `MPESA_PRODUCTION_CERT`.
//!
//! # Example
//!
//! ```rust
//! use mpesa_kit::config::Environment;
//! use mpesa_kit::credential::SecurityCredentialCodec;
//!
//! let codec = SecurityCredentialCodec::new();
//! let credential = codec.encrypt("Safaricom999!*!", Environment::Sandbox).unwrap();
//! assert!(!credential.is_empty());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tracing::{debug, instrument, warn};

use crate::config::{Environment, MpesaConfig};
use crate::error::EncryptionError;

/// Bundled sandbox certificate
pub const SANDBOX_CERTIFICATE: &str = include_str!("../certs/sandbox.cer");

/// Bundled production certificate
pub const PRODUCTION_CERTIFICATE: &str = include_str!("../certs/production.cer");

/// Encrypts initiator passwords into Daraja security credentials
#[derive(Debug, Clone, Default)]
pub struct SecurityCredentialCodec {
    sandbox_certificate: Option<PathBuf>,
    production_certificate: Option<PathBuf>,
}

impl SecurityCredentialCodec {
    /// Codec that only uses the bundled certificates
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec using the certificate paths from configuration
    pub fn from_config(config: &MpesaConfig) -> Self {
        Self {
            sandbox_certificate: config.sandbox_certificate.clone(),
            production_certificate: config.production_certificate.clone(),
        }
    }

    /// Use a certificate file for one environment
    pub fn with_certificate<P: Into<PathBuf>>(mut self, environment: Environment, path: P) -> Self {
        match environment {
            Environment::Sandbox => self.sandbox_certificate = Some(path.into()),
            Environment::Production => self.production_certificate = Some(path.into()),
        }
        self
    }

    /// Encrypt an initiator password for `environment`
    ///
    /// # Errors
    ///
    /// - `EncryptionError::EmptyPassword` for an empty password
    /// - `EncryptionError::CertificateUnavailable` when the certificate cannot
    ///   be read or does not hold an RSA key
    /// - `EncryptionError::Rsa` when the RSA operation fails
    #[instrument(skip(self, initiator_password))]
    pub fn encrypt(
        &self,
        initiator_password: &str,
        environment: Environment,
    ) -> Result<String, EncryptionError> {
        if initiator_password.is_empty() {
            return Err(EncryptionError::EmptyPassword);
        }

        let public_key = self.public_key(environment)?;
        let ciphertext =
            public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, initiator_password.as_bytes())?;

        Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext))
    }

    /// Load the RSA public key for `environment`
    pub fn public_key(&self, environment: Environment) -> Result<RsaPublicKey, EncryptionError> {
        let configured = match environment {
            Environment::Sandbox => self.sandbox_certificate.as_deref(),
            Environment::Production => self.production_certificate.as_deref(),
        };

        match configured {
            Some(path) if path.exists() => load_certificate_file(path),
            Some(path) => {
                warn!(
                    path = %path.display(),
                    environment = %environment,
                    "Configured certificate not found, using bundled certificate"
                );
                bundled_public_key(environment)
            }
            None => bundled_public_key(environment),
        }
    }
}

/// Encrypt with the bundled certificate for `environment`
pub fn encrypt_credential(
    initiator_password: &str,
    environment: Environment,
) -> Result<String, EncryptionError> {
    SecurityCredentialCodec::new().encrypt(initiator_password, environment)
}

fn bundled_public_key(environment: Environment) -> Result<RsaPublicKey, EncryptionError> {
    let (name, pem) = match environment {
        Environment::Sandbox => ("bundled sandbox certificate", SANDBOX_CERTIFICATE),
        Environment::Production => ("bundled production certificate", PRODUCTION_CERTIFICATE),
    };
    decode_public_key(pem.as_bytes(), name)
}

fn load_certificate_file(path: &Path) -> Result<RsaPublicKey, EncryptionError> {
    let source_name = path.display().to_string();
    debug!(path = %source_name, "Loading certificate");

    let bytes = fs::read(path).map_err(|e| EncryptionError::CertificateUnavailable {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;
    decode_public_key(&bytes, &source_name)
}

/// Decode an RSA public key from a PEM/DER X.509 certificate or a PEM public key
pub fn decode_public_key(bytes: &[u8], source_name: &str) -> Result<RsaPublicKey, EncryptionError> {
    let unavailable = |reason: String| EncryptionError::CertificateUnavailable {
        source_name: source_name.to_string(),
        reason,
    };

    if let Ok(text) = std::str::from_utf8(bytes) {
        if text.contains("-----BEGIN PUBLIC KEY-----") {
            return RsaPublicKey::from_public_key_pem(text.trim())
                .map_err(|e| unavailable(e.to_string()));
        }
        if text.contains("-----BEGIN RSA PUBLIC KEY-----") {
            return RsaPublicKey::from_pkcs1_pem(text.trim())
                .map_err(|e| unavailable(e.to_string()));
        }
    }

    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let trimmed = &bytes[start..];

    let der = if trimmed.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(trimmed)
            .map_err(|e| unavailable(format!("invalid PEM: {e:?}")))?;
        pem.contents
    } else {
        trimmed.to_vec()
    };

    let (_, certificate) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| unavailable(format!("invalid X.509 certificate: {e:?}")))?;

    RsaPublicKey::from_public_key_der(certificate.public_key().raw)
        .map_err(|e| unavailable(format!("certificate does not hold an RSA key: {e}")))
}
