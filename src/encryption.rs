//! Reversible encryption for secure fields.
//!
//! A [`KeyFile`] holds 32 bytes of random key material. Values are
//! encrypted with a concrete [`Cipher`]; the `best` method is resolved at
//! encryption time and the resolved cipher is recorded in the resulting
//! [`SecureValue`], so decryption never re-runs the selection.
//!
//! The [`Keyring`] is the per-config-tree context that decides which key
//! file is active and caches key files that have already been read.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Size of the key material in bytes.
pub const KEY_LEN: usize = 32;

/// Default key file name, placed beside the config file or in the home directory.
pub const KEY_FILE_NAME: &str = ".schemaconf.key";

// ============================================================================
// Methods
// ============================================================================

/// Requested encryption method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMethod {
    /// Strongest cipher compiled into this build
    #[default]
    Best,
    /// AES-256-GCM
    Aes,
    /// XOR obfuscation (always available, not real encryption)
    Xor,
}

impl EncryptionMethod {
    /// Resolves the method to a concrete cipher.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unavailable`] when `aes` is requested and the
    /// `aes` feature is disabled.
    pub fn resolve(self) -> Result<Cipher, CryptoError> {
        match self {
            Self::Best if cfg!(feature = "aes") => Ok(Cipher::Aes),
            Self::Best | Self::Xor => Ok(Cipher::Xor),
            Self::Aes if cfg!(feature = "aes") => Ok(Cipher::Aes),
            Self::Aes => Err(CryptoError::Unavailable {
                method: self.to_string(),
            }),
        }
    }

    /// Returns the method identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Aes => "aes",
            Self::Xor => "xor",
        }
    }
}

impl FromStr for EncryptionMethod {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(Self::Best),
            "aes" => Ok(Self::Aes),
            "xor" => Ok(Self::Xor),
            other => Err(CryptoError::UnknownMethod {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete cipher. This is what gets persisted; it cannot be `best`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cipher {
    /// AES-256-GCM with a random 12-byte nonce prefix
    Aes,
    /// XOR with the key, cycling
    Xor,
}

impl Cipher {
    /// Returns the cipher identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes => "aes",
            Self::Xor => "xor",
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Cipher> for EncryptionMethod {
    fn from(cipher: Cipher) -> Self {
        match cipher {
            Cipher::Aes => Self::Aes,
            Cipher::Xor => Self::Xor,
        }
    }
}

// ============================================================================
// Secure Value
// ============================================================================

/// An encrypted value: the concrete cipher and its ciphertext.
///
/// Persisted as `{"method": "aes", "ciphertext": "<base64>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureValue {
    /// Cipher used to produce `ciphertext`
    pub method: Cipher,
    /// Encrypted bytes
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl SecureValue {
    /// Converts to the persisted mapping form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "method": self.method.as_str(),
            "ciphertext": base64_bytes::encode(&self.ciphertext),
        })
    }

    /// Parses the persisted mapping form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Malformed`] if the value is not a mapping with
    /// a concrete `method` and base64 `ciphertext`.
    pub fn from_value(value: &Value) -> Result<Self, CryptoError> {
        Self::deserialize(value).map_err(|e| CryptoError::Malformed {
            message: e.to_string(),
        })
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Providers
// ============================================================================

/// A symmetric cipher keyed by the key file.
trait EncryptionProvider {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// XOR obfuscation. Only hides values from casual inspection.
struct XorProvider<'k> {
    key: &'k [u8],
}

impl XorProvider<'_> {
    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }
}

impl EncryptionProvider for XorProvider<'_> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.apply(plaintext))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.apply(ciphertext))
    }
}

#[cfg(feature = "aes")]
mod aes {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use rand::RngCore;

    use super::EncryptionProvider;
    use crate::error::CryptoError;

    const NONCE_LEN: usize = 12;
    const TAG_LEN: usize = 16;

    /// AES-256-GCM. Each ciphertext is `nonce || sealed`.
    pub struct AesProvider {
        cipher: Aes256Gcm,
    }

    impl AesProvider {
        pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encrypt {
                message: e.to_string(),
            })?;
            Ok(Self { cipher })
        }
    }

    impl EncryptionProvider for AesProvider {
        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
            let mut nonce = [0u8; NONCE_LEN];
            rand::rng().fill_bytes(&mut nonce);

            let sealed = self
                .cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|e| CryptoError::Encrypt {
                    message: e.to_string(),
                })?;

            let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
            out.extend_from_slice(&nonce);
            out.extend_from_slice(&sealed);
            Ok(out)
        }

        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
            if ciphertext.len() < NONCE_LEN + TAG_LEN {
                return Err(CryptoError::Decrypt {
                    message: "ciphertext is too short".to_string(),
                });
            }
            let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
            self.cipher
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| CryptoError::Decrypt {
                    message: "authentication failed (wrong key or corrupt ciphertext)".to_string(),
                })
        }
    }
}

// ============================================================================
// Key File
// ============================================================================

/// 32 bytes of key material backed by a file.
pub struct KeyFile {
    path: PathBuf,
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFile")
            .field("path", &self.path)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl KeyFile {
    /// Reads the key file at `path`, generating a new one if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the file is not exactly
    /// [`KEY_LEN`] bytes, or [`CryptoError::Io`] if it cannot be read or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                if bytes.len() != KEY_LEN {
                    return Err(CryptoError::InvalidKey {
                        path: path.to_path_buf(),
                        len: bytes.len(),
                    });
                }
                let mut key = Zeroizing::new([0u8; KEY_LEN]);
                key.copy_from_slice(&bytes);
                debug!(path = %path.display(), "loaded key file");
                Ok(Self {
                    path: path.to_path_buf(),
                    key,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Self::generate(path),
            Err(source) => Err(CryptoError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Generates fresh key material and writes it to `path`, replacing any
    /// existing key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Io`] if the file or its parent directory
    /// cannot be written.
    pub fn generate(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut key[..]);

        let io_err = |source| CryptoError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, &key[..]).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }

        info!(path = %path.display(), "generated new key file");
        Ok(Self {
            path: path.to_path_buf(),
            key,
        })
    }

    /// Path the key was read from or written to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypts `plaintext`, resolving `method` to a concrete cipher.
    ///
    /// Empty plaintext produces an empty ciphertext without invoking a cipher.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] if the method is unavailable or the cipher fails.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        method: EncryptionMethod,
    ) -> Result<SecureValue, CryptoError> {
        let cipher = method.resolve()?;
        if plaintext.is_empty() {
            return Ok(SecureValue {
                method: cipher,
                ciphertext: Vec::new(),
            });
        }
        let ciphertext = self.with_provider(cipher, |p| p.encrypt(plaintext))?;
        Ok(SecureValue {
            method: cipher,
            ciphertext,
        })
    }

    /// Decrypts `value` with the cipher recorded in it.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] if the cipher is unavailable or the
    /// ciphertext does not decrypt under this key.
    pub fn decrypt(&self, value: &SecureValue) -> Result<Vec<u8>, CryptoError> {
        if value.ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        self.with_provider(value.method, |p| p.decrypt(&value.ciphertext))
    }

    fn with_provider<T>(
        &self,
        cipher: Cipher,
        f: impl FnOnce(&dyn EncryptionProvider) -> Result<T, CryptoError>,
    ) -> Result<T, CryptoError> {
        match cipher {
            Cipher::Xor => f(&XorProvider { key: &self.key[..] }),
            #[cfg(feature = "aes")]
            Cipher::Aes => f(&aes::AesProvider::new(&self.key[..])?),
            #[cfg(not(feature = "aes"))]
            Cipher::Aes => Err(CryptoError::Unavailable {
                method: cipher.to_string(),
            }),
        }
    }
}

// ============================================================================
// Keyring
// ============================================================================

/// Key file context shared by a config tree.
///
/// Resolves the active key path and caches every key file it has opened,
/// so each path is read at most once.
#[derive(Debug, Default)]
pub struct Keyring {
    state: Mutex<KeyringState>,
}

#[derive(Debug, Default)]
struct KeyringState {
    explicit: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    cache: HashMap<PathBuf, Arc<KeyFile>>,
}

impl Keyring {
    /// Creates a keyring that uses the default key path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keyring bound to an explicit key file path.
    #[must_use]
    pub fn with_key_file(path: impl Into<PathBuf>) -> Self {
        let keyring = Self::default();
        keyring.set_key_file(path);
        keyring
    }

    /// An independent keyring with the same key path settings. Opened key
    /// files are shared with the copy.
    #[must_use]
    pub fn fork(&self) -> Self {
        let state = self.lock();
        Self {
            state: Mutex::new(KeyringState {
                explicit: state.explicit.clone(),
                base_dir: state.base_dir.clone(),
                cache: state.cache.clone(),
            }),
        }
    }

    /// Uses `path` as the key file from now on.
    pub fn set_key_file(&self, path: impl Into<PathBuf>) {
        self.lock().explicit = Some(path.into());
    }

    /// Records the directory of the file being loaded or saved; the default
    /// key path is resolved relative to it.
    pub(crate) fn set_base_dir(&self, dir: Option<&Path>) {
        self.lock().base_dir = dir.map(Path::to_path_buf);
    }

    /// Returns the key path that encryption would use right now.
    ///
    /// Precedence: explicit path, then [`KEY_FILE_NAME`] beside the loaded
    /// or saved file, then in the home directory, then the working directory.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        let state = self.lock();
        if let Some(path) = &state.explicit {
            return path.clone();
        }
        state
            .base_dir
            .clone()
            .or_else(dirs::home_dir)
            .map_or_else(|| PathBuf::from(KEY_FILE_NAME), |dir| dir.join(KEY_FILE_NAME))
    }

    /// Opens (or creates) the key file at `path`, reusing a cached copy.
    ///
    /// # Errors
    ///
    /// Propagates [`KeyFile::open`] errors.
    pub fn open(&self, path: &Path) -> Result<Arc<KeyFile>, CryptoError> {
        if let Some(key) = self.lock().cache.get(path) {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(KeyFile::open(path)?);
        self.lock()
            .cache
            .insert(path.to_path_buf(), Arc::clone(&key));
        Ok(key)
    }

    /// Opens the active key file.
    ///
    /// # Errors
    ///
    /// Propagates [`KeyFile::open`] errors.
    pub fn key_file(&self) -> Result<Arc<KeyFile>, CryptoError> {
        self.open(&self.key_path())
    }

    /// Encrypts with the active key. Empty plaintext never touches the key file.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] if the key cannot be loaded or the cipher fails.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        method: EncryptionMethod,
    ) -> Result<SecureValue, CryptoError> {
        if plaintext.is_empty() {
            return Ok(SecureValue {
                method: method.resolve()?,
                ciphertext: Vec::new(),
            });
        }
        self.key_file()?.encrypt(plaintext, method)
    }

    /// Decrypts with the active key. Empty ciphertext never touches the key file.
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] if the key cannot be loaded or decryption fails.
    pub fn decrypt(&self, value: &SecureValue) -> Result<Vec<u8>, CryptoError> {
        if value.ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        self.key_file()?.decrypt(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, KeyringState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_key() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.key");
        (dir, path)
    }

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!("best".parse::<EncryptionMethod>().unwrap(), EncryptionMethod::Best);
        assert_eq!("xor".parse::<EncryptionMethod>().unwrap(), EncryptionMethod::Xor);
        assert!(matches!(
            "rot13".parse::<EncryptionMethod>(),
            Err(CryptoError::UnknownMethod { .. })
        ));
        assert_eq!(EncryptionMethod::Aes.to_string(), "aes");
    }

    #[test]
    fn test_best_resolves_to_concrete_cipher() {
        let cipher = EncryptionMethod::Best.resolve().unwrap();
        if cfg!(feature = "aes") {
            assert_eq!(cipher, Cipher::Aes);
        } else {
            assert_eq!(cipher, Cipher::Xor);
        }
    }

    #[test]
    fn test_key_file_created_when_missing() {
        let (_dir, path) = temp_key();
        let key = KeyFile::open(&path).unwrap();
        assert_eq!(key.path(), path);
        assert_eq!(fs::read(&path).unwrap().len(), KEY_LEN);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        // Reopening reads the same key back
        let plain = b"hello";
        let secret = key.encrypt(plain, EncryptionMethod::Xor).unwrap();
        let reopened = KeyFile::open(&path).unwrap();
        assert_eq!(reopened.decrypt(&secret).unwrap(), plain);
    }

    #[test]
    fn test_key_file_wrong_length_rejected() {
        let (_dir, path) = temp_key();
        fs::write(&path, b"short").unwrap();
        let err = KeyFile::open(&path).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey { len: 5, .. }));
    }

    #[test]
    fn test_xor_round_trip() {
        let (_dir, path) = temp_key();
        let key = KeyFile::open(&path).unwrap();
        let secret = key.encrypt(b"a secret longer than thirty-two bytes!", EncryptionMethod::Xor).unwrap();
        assert_eq!(secret.method, Cipher::Xor);
        assert_ne!(secret.ciphertext, b"a secret longer than thirty-two bytes!");
        assert_eq!(
            key.decrypt(&secret).unwrap(),
            b"a secret longer than thirty-two bytes!"
        );
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_aes_round_trip_and_tamper() {
        let (_dir, path) = temp_key();
        let key = KeyFile::open(&path).unwrap();
        let secret = key.encrypt(b"p@ssw0rd", EncryptionMethod::Aes).unwrap();
        assert_eq!(secret.method, Cipher::Aes);
        assert_eq!(key.decrypt(&secret).unwrap(), b"p@ssw0rd");

        // Fresh nonce per encryption
        let again = key.encrypt(b"p@ssw0rd", EncryptionMethod::Aes).unwrap();
        assert_ne!(secret.ciphertext, again.ciphertext);

        let mut tampered = secret.clone();
        let last = tampered.ciphertext.len() - 1;
        tampered.ciphertext[last] ^= 0xff;
        assert!(matches!(key.decrypt(&tampered), Err(CryptoError::Decrypt { .. })));

        let truncated = SecureValue {
            method: Cipher::Aes,
            ciphertext: vec![1, 2, 3],
        };
        assert!(matches!(key.decrypt(&truncated), Err(CryptoError::Decrypt { .. })));
    }

    #[test]
    fn test_best_is_never_persisted() {
        let (_dir, path) = temp_key();
        let key = KeyFile::open(&path).unwrap();
        let secret = key.encrypt(b"value", EncryptionMethod::Best).unwrap();
        let persisted = secret.to_value();
        assert_ne!(persisted["method"], "best");

        let parsed = SecureValue::from_value(&persisted).unwrap();
        assert_eq!(key.decrypt(&parsed).unwrap(), b"value");
    }

    #[test]
    fn test_empty_plaintext_bypasses_cipher() {
        let (_dir, path) = temp_key();
        let keyring = Keyring::with_key_file(&path);
        let secret = keyring.encrypt(b"", EncryptionMethod::Best).unwrap();
        assert!(secret.ciphertext.is_empty());
        assert_eq!(keyring.decrypt(&secret).unwrap(), b"");
        // No key material was needed
        assert!(!path.exists());
    }

    #[test]
    fn test_secure_value_rejects_best_and_bad_base64() {
        let best = serde_json::json!({"method": "best", "ciphertext": ""});
        assert!(matches!(
            SecureValue::from_value(&best),
            Err(CryptoError::Malformed { .. })
        ));

        let bad = serde_json::json!({"method": "xor", "ciphertext": "not base64!"});
        assert!(SecureValue::from_value(&bad).is_err());
    }

    #[test]
    fn test_keyring_caches_by_path() {
        let (_dir, path) = temp_key();
        let keyring = Keyring::with_key_file(&path);
        let first = keyring.key_file().unwrap();
        let second = keyring.key_file().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_keyring_fork_is_independent() {
        let (_dir, path) = temp_key();
        let keyring = Keyring::with_key_file(&path);
        let first = keyring.key_file().unwrap();

        let fork = keyring.fork();
        assert_eq!(fork.key_path(), path);
        assert!(Arc::ptr_eq(&fork.key_file().unwrap(), &first));

        fork.set_key_file(path.with_extension("other"));
        assert_eq!(keyring.key_path(), path);
    }

    #[test]
    fn test_keyring_path_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::new();
        keyring.set_base_dir(Some(dir.path()));
        assert_eq!(keyring.key_path(), dir.path().join(KEY_FILE_NAME));

        keyring.set_key_file(dir.path().join("explicit.key"));
        assert_eq!(keyring.key_path(), dir.path().join("explicit.key"));
    }
}
