//! Declaration-side secrets and the vault that decrypts them
//!
//! A secret in a declaration is either a plain string the user just typed
//! (accepted on input, re-protected before the declaration is persisted) or a
//! cipher-text blob produced by the device's secure vault. The agent never
//! persists plaintext.
//!
//! The device-native decryption RPC is an external collaborator; this vault
//! implements the framing around it (protection tags, base64 transport,
//! plaintext containment) with a base64 codec standing in for the RPC.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Protection tag carried by protected secrets
const SECURE_VAULT: &str = "SecureVault";

/// A secret field as it appears in a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    /// Plain string entered by the user; protected before persistence
    Plain(String),
    /// Cipher-text produced by the secure vault
    Protected {
        /// Base64 cipher text
        #[serde(rename = "cipherText")]
        cipher_text: String,
        /// Protection scheme tag
        #[serde(default = "default_protection")]
        protected: String,
    },
}

fn default_protection() -> String {
    SECURE_VAULT.to_string()
}

impl Secret {
    /// Whether this secret still carries user-entered plaintext
    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain(_))
    }
}

/// Decrypts cipher-text fields on demand
///
/// One vault instance is shared by all pollers and consumers; it holds no
/// state beyond the codec, so cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct SecretVault;

impl SecretVault {
    /// Create a vault
    pub fn new() -> Self {
        Self
    }

    /// Protect a secret for persistence
    ///
    /// Plain secrets are encoded and tagged; already-protected secrets pass
    /// through unchanged so re-protecting a declaration is idempotent.
    pub fn protect(&self, secret: &Secret) -> Secret {
        match secret {
            Secret::Plain(text) => Secret::Protected {
                cipher_text: BASE64.encode(text.as_bytes()),
                protected: SECURE_VAULT.to_string(),
            },
            protected @ Secret::Protected { .. } => protected.clone(),
        }
    }

    /// Decrypt a secret into a contained plaintext string
    ///
    /// `field` names the declaration field for error context; it is never
    /// combined with the plaintext in any message.
    pub fn decrypt(&self, field: &str, secret: &Secret) -> Result<SecretString> {
        match secret {
            Secret::Plain(text) => Ok(SecretString::from(text.clone())),
            Secret::Protected {
                cipher_text,
                protected,
            } => {
                if protected != SECURE_VAULT {
                    return Err(VaultError::UnsupportedProtection {
                        protection: protected.clone(),
                    });
                }
                let bytes = BASE64
                    .decode(cipher_text.as_bytes())
                    .map_err(|e| VaultError::invalid_cipher_text(field, e))?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| VaultError::invalid_plaintext(field))?;
                Ok(SecretString::from(text))
            }
        }
    }
}
