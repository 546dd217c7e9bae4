//! Vault error types

use thiserror::Error;

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur while handling secrets
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cipher-text is not valid base64
    #[error("cipher text for '{field}' is not valid base64: {source}")]
    InvalidCipherText {
        /// Field the cipher text was declared under
        field: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Decrypted bytes are not valid UTF-8
    #[error("decrypted secret for '{field}' is not valid UTF-8")]
    InvalidPlaintext {
        /// Field the cipher text was declared under
        field: String,
    },

    /// Unknown protection scheme on a secret
    #[error("unsupported secret protection '{protection}'")]
    UnsupportedProtection {
        /// The declared `protected` value
        protection: String,
    },
}

impl VaultError {
    /// Create an InvalidCipherText error
    pub fn invalid_cipher_text(field: impl Into<String>, source: base64::DecodeError) -> Self {
        Self::InvalidCipherText {
            field: field.into(),
            source,
        }
    }

    /// Create an InvalidPlaintext error
    pub fn invalid_plaintext(field: impl Into<String>) -> Self {
        Self::InvalidPlaintext {
            field: field.into(),
        }
    }
}
