//! Secure and challenge fields.
//!
//! A [`SecureField`] holds plaintext in memory and persists it encrypted
//! as a [`SecureValue`]. A [`ChallengeField`] never holds plaintext at all:
//! values are stored as a salted digest that can only be verified.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::{Field, FieldOptions, Shape, value_type};
use crate::encryption::{EncryptionMethod, Keyring, SecureValue};
use crate::error::{CryptoError, FieldError};

// ============================================================================
// Secure Field
// ============================================================================

/// A string persisted in encrypted form.
///
/// In memory the value is plaintext. When the config is saved it is
/// encrypted with the active key from the config's [`Keyring`]; empty
/// strings are written as-is. On load both an encrypted mapping and a
/// plaintext string are accepted, so a hand-written file may contain the
/// plaintext until it is saved once. Sensitive by default.
#[derive(Debug, Clone)]
pub struct SecureField {
    options: FieldOptions,
    method: EncryptionMethod,
}

impl Default for SecureField {
    fn default() -> Self {
        Self {
            options: FieldOptions {
                sensitive: true,
                ..FieldOptions::default()
            },
            method: EncryptionMethod::Best,
        }
    }
}

impl SecureField {
    /// Creates a secure field using the best available cipher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encryption method.
    #[must_use]
    pub const fn method(mut self, method: EncryptionMethod) -> Self {
        self.method = method;
        self
    }

    /// The configured encryption method.
    #[must_use]
    pub const fn encryption_method(&self) -> EncryptionMethod {
        self.method
    }
}

impl Field for SecureField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "secret"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        match value {
            Value::String(_) => Ok(value),
            other => Err(FieldError::invalid(format!(
                "value must be a string, not a {}",
                value_type(&other)
            ))),
        }
    }

    fn to_basic(&self, keys: &Keyring, value: &Value) -> Result<Value, FieldError> {
        match value {
            Value::String(plain) if !plain.is_empty() => {
                Ok(keys.encrypt(plain.as_bytes(), self.method)?.to_value())
            }
            _ => Ok(value.clone()),
        }
    }

    fn from_basic(&self, keys: &Keyring, value: Value) -> Result<Value, FieldError> {
        if !value.is_object() {
            return Ok(value);
        }
        let secret = SecureValue::from_value(&value)?;
        let plain = keys.decrypt(&secret)?;
        String::from_utf8(plain).map(Value::String).map_err(|_| {
            FieldError::Crypto(CryptoError::Malformed {
                message: "decrypted value is not valid UTF-8".to_string(),
            })
        })
    }
}

// ============================================================================
// Challenge Field
// ============================================================================

/// Hash algorithm for [`ChallengeField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-224
    Sha224,
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Digest length in bytes; also the salt length.
    #[must_use]
    pub fn digest_size(self) -> usize {
        match self {
            Self::Sha224 => <Sha224 as Digest>::output_size(),
            Self::Sha256 => <Sha256 as Digest>::output_size(),
            Self::Sha384 => <Sha384 as Digest>::output_size(),
            Self::Sha512 => <Sha512 as Digest>::output_size(),
        }
    }

    fn hash(self, salt: &[u8], plaintext: &[u8]) -> Vec<u8> {
        fn run<D: Digest>(salt: &[u8], plaintext: &[u8]) -> Vec<u8> {
            D::new()
                .chain_update(salt)
                .chain_update(plaintext)
                .finalize()
                .to_vec()
        }
        match self {
            Self::Sha224 => run::<Sha224>(salt, plaintext),
            Self::Sha256 => run::<Sha256>(salt, plaintext),
            Self::Sha384 => run::<Sha384>(salt, plaintext),
            Self::Sha512 => run::<Sha512>(salt, plaintext),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(FieldError::invalid(format!("unknown hash algorithm: {other}"))),
        }
    }
}

/// A salted digest: `digest = hash(salt || plaintext)`.
#[derive(Clone, PartialEq, Eq)]
pub struct DigestValue {
    /// Random salt, as long as the digest
    pub salt: Vec<u8>,
    /// Hash of salt and plaintext
    pub digest: Vec<u8>,
}

impl fmt::Debug for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestValue({self})")
    }
}

impl fmt::Display for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", STANDARD.encode(&self.salt), STANDARD.encode(&self.digest))
    }
}

impl DigestValue {
    /// Hashes `plaintext` with a fresh random salt.
    #[must_use]
    pub fn create(plaintext: &str, algorithm: DigestAlgorithm) -> Self {
        let mut salt = vec![0u8; algorithm.digest_size()];
        rand::rng().fill_bytes(&mut salt);
        let digest = algorithm.hash(&salt, plaintext.as_bytes());
        Self { salt, digest }
    }

    /// Parses the `{"salt": <base64>, "digest": <base64>}` form.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] if either key is missing or not base64.
    pub fn from_value(value: &Value) -> Result<Self, FieldError> {
        let decode = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| STANDARD.decode(s).ok())
                .ok_or_else(|| FieldError::invalid("invalid salt/digest value"))
        };
        Ok(Self {
            salt: decode("salt")?,
            digest: decode("digest")?,
        })
    }

    /// Converts to the `{"salt", "digest"}` form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "salt": STANDARD.encode(&self.salt),
            "digest": STANDARD.encode(&self.digest),
        })
    }

    /// Checks whether `plaintext` hashes to this digest.
    #[must_use]
    pub fn verify(&self, plaintext: &str, algorithm: DigestAlgorithm) -> bool {
        let candidate = algorithm.hash(&self.salt, plaintext.as_bytes());
        candidate.len() == self.digest.len()
            && candidate
                .iter()
                .zip(&self.digest)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// A value stored only as a salted digest, for password-style checks.
///
/// Accepts a plaintext string (hashed with a fresh salt) or an existing
/// `{"salt", "digest"}` mapping. A plaintext default is hashed on every
/// read. Sensitive by default.
#[derive(Debug, Clone)]
pub struct ChallengeField {
    options: FieldOptions,
    algorithm: DigestAlgorithm,
}

impl Default for ChallengeField {
    fn default() -> Self {
        Self {
            options: FieldOptions {
                sensitive: true,
                ..FieldOptions::default()
            },
            algorithm: DigestAlgorithm::default(),
        }
    }
}

impl ChallengeField {
    /// Creates a challenge field using SHA-256.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hash algorithm.
    #[must_use]
    pub const fn algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Checks `plaintext` against a stored value of this field.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] if `stored` is not a salt/digest mapping.
    pub fn verify(&self, stored: &Value, plaintext: &str) -> Result<bool, FieldError> {
        Ok(DigestValue::from_value(stored)?.verify(plaintext, self.algorithm))
    }
}

impl Field for ChallengeField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "digest"
    }

    fn shape(&self) -> Shape {
        Shape::Opaque
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        match &value {
            Value::String(plain) => Ok(DigestValue::create(plain, self.algorithm).to_value()),
            Value::Object(_) => {
                let digest = DigestValue::from_value(&value)?;
                if digest.digest.len() != self.algorithm.digest_size() {
                    return Err(FieldError::invalid("digest length does not match algorithm"));
                }
                Ok(digest.to_value())
            }
            other => Err(FieldError::invalid(format!(
                "value must be a string, not a {}",
                value_type(other)
            ))),
        }
    }

    fn default_value(&self) -> Result<Value, FieldError> {
        let raw = match self.env_value() {
            Some(raw) => Value::String(raw),
            None => match &self.options.default {
                super::DefaultValue::None => Value::Null,
                super::DefaultValue::Static(value) => value.clone(),
                super::DefaultValue::Factory(factory) => factory(),
            },
        };
        self.validate(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::Cipher;
    use serde_json::json;

    fn keyring() -> (tempfile::TempDir, Keyring) {
        let dir = tempfile::tempdir().unwrap();
        let keys = Keyring::with_key_file(dir.path().join("k.key"));
        (dir, keys)
    }

    #[test]
    fn test_secure_field_is_sensitive() {
        assert!(SecureField::new().options().sensitive);
    }

    #[test]
    fn test_secure_round_trip_best() {
        let (_dir, keys) = keyring();
        let field = SecureField::new();
        let basic = field.to_basic(&keys, &json!("hunter2")).unwrap();
        assert!(basic.is_object());
        assert_ne!(basic["method"], "best");
        assert_ne!(basic["ciphertext"], "hunter2");

        let plain = field.from_basic(&keys, basic).unwrap();
        assert_eq!(plain, json!("hunter2"));
    }

    #[test]
    fn test_secure_empty_stays_plain() {
        let (dir, keys) = keyring();
        let field = SecureField::new();
        assert_eq!(field.to_basic(&keys, &json!("")).unwrap(), json!(""));
        assert_eq!(field.to_basic(&keys, &Value::Null).unwrap(), Value::Null);
        assert!(!dir.path().join("k.key").exists());
    }

    #[test]
    fn test_secure_decrypts_with_recorded_method() {
        let (_dir, keys) = keyring();
        let xor = SecureField::new().method(EncryptionMethod::Xor);
        let basic = xor.to_basic(&keys, &json!("abc")).unwrap();
        assert_eq!(basic["method"], Cipher::Xor.as_str());

        // A field configured for another method still decrypts it
        let best = SecureField::new();
        assert_eq!(best.from_basic(&keys, basic).unwrap(), json!("abc"));
    }

    #[test]
    fn test_secure_rejects_malformed() {
        let (_dir, keys) = keyring();
        let field = SecureField::new();
        let err = field
            .from_basic(&keys, json!({"method": "rot13", "ciphertext": ""}))
            .unwrap_err();
        assert!(matches!(err, FieldError::Crypto(CryptoError::Malformed { .. })));
        assert!(field.validate(json!(5)).is_err());
    }

    #[test]
    fn test_challenge_hashes_and_verifies() {
        let field = ChallengeField::new();
        let stored = field.validate(json!("s3cret")).unwrap();
        assert!(stored.get("salt").is_some());
        assert!(field.verify(&stored, "s3cret").unwrap());
        assert!(!field.verify(&stored, "guess").unwrap());

        // Already-hashed values pass through unchanged
        assert_eq!(field.validate(stored.clone()).unwrap(), stored);
    }

    #[test]
    fn test_challenge_salt_differs() {
        let a = DigestValue::create("x", DigestAlgorithm::Sha512);
        let b = DigestValue::create("x", DigestAlgorithm::Sha512);
        assert_eq!(a.salt.len(), 64);
        assert_ne!(a, b);
        assert!(b.verify("x", DigestAlgorithm::Sha512));
    }

    #[test]
    fn test_challenge_plaintext_default_is_hashed() {
        use crate::fields::FieldBuilder;
        let field = ChallengeField::new()
            .algorithm(DigestAlgorithm::Sha224)
            .with_default("admin");
        let value = field.default_value().unwrap();
        assert!(field.verify(&value, "admin").unwrap());
    }

    #[test]
    fn test_digest_algorithm_parse() {
        assert_eq!("SHA384".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha384);
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }
}
