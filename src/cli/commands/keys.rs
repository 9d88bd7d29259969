//! Key file and secure value commands.

use std::path::PathBuf;

use crate::cli::args::{DecryptArgs, EncryptArgs, KeygenArgs};
use crate::encryption::{KeyFile, Keyring, SecureValue};
use crate::error::{CryptoError, SchemaconfError};

fn keyring(key: Option<&PathBuf>) -> Keyring {
    key.map_or_else(Keyring::new, Keyring::with_key_file)
}

/// Writes a new key file.
///
/// # Errors
///
/// Returns [`SchemaconfError::Usage`] if the file exists and `--force` was
/// not given, or a [`CryptoError`] if it cannot be written.
pub fn keygen(args: &KeygenArgs) -> Result<(), SchemaconfError> {
    if args.path.exists() && !args.force {
        return Err(SchemaconfError::Usage(format!(
            "{} already exists (use --force to replace it)",
            args.path.display()
        )));
    }
    let key = KeyFile::generate(&args.path)?;
    println!("{}", key.path().display());
    Ok(())
}

/// Encrypts the given text and prints the persisted form.
///
/// # Errors
///
/// Returns a [`CryptoError`] if the key cannot be loaded or the cipher fails.
pub fn encrypt(args: &EncryptArgs) -> Result<(), SchemaconfError> {
    let value = keyring(args.key.as_ref()).encrypt(args.text.as_bytes(), args.method)?;
    println!("{}", value.to_value());
    Ok(())
}

/// Decrypts a persisted secure value and prints the plaintext.
///
/// # Errors
///
/// Returns [`CryptoError::Malformed`] if the argument is not a secure
/// value, or another [`CryptoError`] if decryption fails.
pub fn decrypt(args: &DecryptArgs) -> Result<(), SchemaconfError> {
    let plaintext = decrypt_text(&keyring(args.key.as_ref()), &args.value)?;
    println!("{plaintext}");
    Ok(())
}

fn decrypt_text(keys: &Keyring, raw: &str) -> Result<String, CryptoError> {
    let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| CryptoError::Malformed {
        message: e.to_string(),
    })?;
    let value = SecureValue::from_value(&json)?;
    String::from_utf8(keys.decrypt(&value)?).map_err(|e| CryptoError::Malformed {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::EncryptionMethod;

    #[test]
    fn test_keygen_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.key");
        keygen(&KeygenArgs {
            path: path.clone(),
            force: false,
        })
        .unwrap();
        let first = std::fs::read(&path).unwrap();

        let err = keygen(&KeygenArgs {
            path: path.clone(),
            force: false,
        })
        .unwrap_err();
        assert!(matches!(err, SchemaconfError::Usage(_)));

        keygen(&KeygenArgs {
            path: path.clone(),
            force: true,
        })
        .unwrap();
        assert_ne!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_decrypt_text_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let keys = Keyring::with_key_file(dir.path().join("k.key"));
        let value = keys.encrypt(b"hunter2", EncryptionMethod::Xor).unwrap();
        let raw = value.to_value().to_string();
        assert_eq!(decrypt_text(&keys, &raw).unwrap(), "hunter2");
        assert!(decrypt_text(&keys, "not json").is_err());
    }
}
