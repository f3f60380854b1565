//! Ephemeral in-memory keyring for backup recipients
//!
//! Keys are imported from ASCII-armored OpenPGP public key blocks (one block
//! may carry several keys, as `gpg --armor --export` writes them). Each key
//! is identified by the lowercase hex SHA-256 of its primary key packet.
//! Nothing is written to disk; the keyring lives exactly as long as the run
//! that built it.

use pgp::ser::Serialize as _;
use pgp::types::PublicKeyTrait;
use pgp::{Deserializable, SignedPublicKey, SignedPublicSubKey};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;

use crate::error::{BackupError, BackupResult};
use crate::logging::{Stage, log_stage, log_stage_failure};

/// Shortest fingerprint prefix accepted as a recipient selector
const MIN_SELECTOR_LEN: usize = 8;

/// Key material a message is encrypted to
#[derive(Debug, Clone, Copy)]
pub enum EncryptionKey<'a> {
    Subkey(&'a SignedPublicSubKey),
    Primary(&'a SignedPublicKey),
}

/// A verified recipient public key and its fingerprint
#[derive(Debug, Clone)]
pub struct RecipientKey {
    key: SignedPublicKey,
    fingerprint: String,
}

impl RecipientKey {
    /// Accept a key whose self-signatures verify and that can receive
    /// encrypted messages
    pub fn from_signed_key(key: SignedPublicKey) -> BackupResult<Self> {
        let fingerprint = fingerprint_of(&key)?;

        key.verify().map_err(|e| {
            BackupError::KeyImport(format!("key {} failed self-signature check: {}", fingerprint, e))
        })?;

        if encryption_key_of(&key).is_none() {
            return Err(BackupError::KeyImport(format!(
                "key {} has no encryption-capable key or subkey",
                fingerprint
            )));
        }

        Ok(Self { key, fingerprint })
    }

    pub fn public_key(&self) -> &SignedPublicKey {
        &self.key
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Primary key algorithm, for display
    pub fn algorithm(&self) -> String {
        format!("{:?}", self.key.algorithm())
    }

    pub fn subkey_count(&self) -> usize {
        self.key.public_subkeys.len()
    }

    /// The first encryption-capable subkey, else the primary key
    pub fn encryption_key(&self) -> BackupResult<EncryptionKey<'_>> {
        encryption_key_of(&self.key).ok_or_else(|| {
            BackupError::Encryption(format!("key {} cannot encrypt", self.fingerprint))
        })
    }
}

fn encryption_key_of(key: &SignedPublicKey) -> Option<EncryptionKey<'_>> {
    key.public_subkeys
        .iter()
        .find(|subkey| subkey.is_encryption_key())
        .map(EncryptionKey::Subkey)
        .or_else(|| key.is_encryption_key().then_some(EncryptionKey::Primary(key)))
}

/// Outcome of an import, for logging and the `fingerprint` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub imported: usize,
    pub fingerprints: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Keyring {
    keys: Vec<RecipientKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[RecipientKey] {
        &self.keys
    }

    /// Read a key file from disk and import every key in it
    pub fn import_file(&mut self, path: &Path) -> BackupResult<ImportResult> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BackupError::key_import_at(path, e))?;

        let result = self.import_armored(&text).map_err(|e| match e {
            BackupError::KeyImport(msg) => BackupError::key_import_at(path, msg),
            other => other,
        });

        match result {
            Ok(result) => {
                log_stage(
                    Stage::KeyImport,
                    &[("keys", result.imported), ("keyring", self.keys.len())],
                    &format!("{}: {}", path.display(), result.fingerprints.join(", ")),
                );
                Ok(result)
            }
            Err(e) => {
                log_stage_failure(Stage::KeyImport, &e);
                Err(e)
            }
        }
    }

    /// Import every public key in an armored block
    ///
    /// All keys are checked before any is added, so a failed import leaves
    /// the keyring unchanged. Text with no usable key is an error.
    pub fn import_armored(&mut self, text: &str) -> BackupResult<ImportResult> {
        let (keys, _headers) = SignedPublicKey::from_armor_many(Cursor::new(text.as_bytes()))
            .map_err(|e| BackupError::KeyImport(format!("invalid OpenPGP armor: {}", e)))?;

        let mut imported = Vec::new();
        for key in keys {
            let key = key
                .map_err(|e| BackupError::KeyImport(format!("invalid OpenPGP public key: {}", e)))?;
            imported.push(RecipientKey::from_signed_key(key)?);
        }

        if imported.is_empty() {
            return Err(BackupError::KeyImport(
                "no OpenPGP public key found".to_string(),
            ));
        }

        let fingerprints: Vec<String> = imported.iter().map(|k| k.fingerprint.clone()).collect();
        for key in imported {
            if self.find_exact(&key.fingerprint).is_none() {
                self.keys.push(key);
            }
        }

        Ok(ImportResult {
            imported: fingerprints.len(),
            fingerprints,
        })
    }

    /// Select the key to encrypt to
    ///
    /// `selector` is a fingerprint or an unambiguous prefix of one. Without a
    /// selector the keyring must hold exactly one key.
    pub fn recipient(&self, selector: Option<&str>) -> BackupResult<&RecipientKey> {
        let Some(selector) = selector else {
            return match self.keys.as_slice() {
                [only] => Ok(only),
                [] => Err(BackupError::RecipientNotFound("keyring is empty".to_string())),
                _ => Err(BackupError::RecipientNotFound(format!(
                    "{} keys imported, a recipient fingerprint is required",
                    self.keys.len()
                ))),
            };
        };

        let wanted = normalize_fingerprint(selector);
        if wanted.len() < MIN_SELECTOR_LEN {
            return Err(BackupError::RecipientNotFound(format!(
                "selector '{}' is shorter than {} hex characters",
                selector, MIN_SELECTOR_LEN
            )));
        }

        let mut matches = self.keys.iter().filter(|k| k.fingerprint.starts_with(&wanted));
        match (matches.next(), matches.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => Err(BackupError::RecipientNotFound(selector.to_string())),
            (Some(_), Some(_)) => Err(BackupError::RecipientNotFound(format!(
                "selector '{}' is ambiguous",
                selector
            ))),
        }
    }

    fn find_exact(&self, fingerprint: &str) -> Option<&RecipientKey> {
        self.keys.iter().find(|k| k.fingerprint == fingerprint)
    }
}

/// Check `key` against a pinned fingerprint
pub fn verify_pin(key: &RecipientKey, pinned: &str) -> BackupResult<()> {
    let pinned = normalize_fingerprint(pinned);
    if key.fingerprint() != pinned {
        let err = BackupError::FingerprintMismatch {
            recipient: key.fingerprint().to_string(),
            pinned,
        };
        log_stage_failure(Stage::KeyPin, &err);
        return Err(err);
    }
    Ok(())
}

/// Lowercase hex with `:` separators and whitespace removed
pub fn normalize_fingerprint(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// SHA-256 over the serialized primary public key packet of `key`
pub fn fingerprint_of(key: &SignedPublicKey) -> BackupResult<String> {
    let packet = key
        .primary_key
        .to_bytes()
        .map_err(|e| BackupError::KeyImport(format!("Failed to serialize public key: {}", e)))?;
    Ok(hex::encode(Sha256::digest(&packet)))
}
