//! OpenPGP encryption of backup artifacts
//!
//! The snapshot is wrapped in a literal data packet, encrypted to the
//! recipient's encryption subkey (SEIPD v1, AES-256) and ASCII armored as a
//! `PGP MESSAGE`, so an operator restores it with `gpg --decrypt`.
//!
//! Before the artifact is handed to the upload stage the armored output is
//! parsed back and must be an encrypted message with at least one
//! recipient; the [`EncryptionReport`] records the result of that check.

use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::{Deserializable, Message, SignedSecretKey};
use serde::Serialize;
use zeroize::Zeroizing;

use super::keyring::{EncryptionKey, RecipientKey};
use crate::error::{BackupError, BackupResult};

/// First line of every artifact
pub const MESSAGE_HEADER: &str = "-----BEGIN PGP MESSAGE-----";

/// File name recorded in the literal data packet
const LITERAL_FILE_NAME: &str = "parameterstore-backup.jsonl";

/// Outcome of an encryption, checked before anything is uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptionReport {
    pub ok: bool,
    pub status: String,
    pub recipient: String,
    pub plaintext_len: usize,
    pub armored_len: usize,
}

#[derive(Debug, Clone)]
pub struct EncryptedArtifact {
    pub armored: String,
    pub report: EncryptionReport,
}

impl EncryptedArtifact {
    /// Inspect `armored` and build the report from what it actually contains
    pub fn inspect(armored: String, recipient: &str, plaintext_len: usize) -> Self {
        let (ok, status) = match inspect_message(&armored) {
            Ok(recipients) => (true, format!("encrypted to {} key(s)", recipients)),
            Err(reason) => (false, reason),
        };

        let report = EncryptionReport {
            ok,
            status,
            recipient: recipient.to_string(),
            plaintext_len,
            armored_len: armored.len(),
        };

        Self { armored, report }
    }

    /// Fail unless the armored output passed inspection
    pub fn ensure_ok(&self) -> BackupResult<()> {
        if !self.report.ok || self.armored.is_empty() {
            return Err(BackupError::Encryption(format!(
                "encryption to {} not usable: {}",
                self.report.recipient, self.report.status
            )));
        }
        Ok(())
    }
}

/// Count the recipients of an armored encrypted message
fn inspect_message(armored: &str) -> Result<usize, String> {
    if !armored.starts_with(MESSAGE_HEADER) {
        return Err("output is not an armored PGP message".to_string());
    }

    match Message::from_string(armored) {
        Ok((Message::Encrypted { esk, .. }, _)) if !esk.is_empty() => Ok(esk.len()),
        Ok(_) => Err("armored output is not encrypted to any key".to_string()),
        Err(e) => Err(format!("armored output does not parse: {}", e)),
    }
}

/// Encrypt `plaintext` to `recipient` and armor the result
pub fn encrypt_armored(recipient: &RecipientKey, plaintext: &[u8]) -> BackupResult<EncryptedArtifact> {
    let mut rng = rand::thread_rng();
    let message = Message::new_literal_bytes(LITERAL_FILE_NAME, plaintext);

    let encrypted = match recipient.encryption_key()? {
        EncryptionKey::Subkey(subkey) => {
            message.encrypt_to_keys_seipdv1(&mut rng, SymmetricKeyAlgorithm::AES256, &[subkey])
        }
        EncryptionKey::Primary(primary) => {
            message.encrypt_to_keys_seipdv1(&mut rng, SymmetricKeyAlgorithm::AES256, &[primary])
        }
    }
    .map_err(|e| BackupError::Encryption(format!("OpenPGP encryption failed: {}", e)))?;

    let armored = encrypted
        .to_armored_string(None.into())
        .map_err(|e| BackupError::Encryption(format!("Failed to armor message: {}", e)))?;

    log::debug!(
        "Encrypted {} bytes to {} ({} byte armor)",
        plaintext.len(),
        recipient.fingerprint(),
        armored.len()
    );

    Ok(EncryptedArtifact::inspect(
        armored,
        recipient.fingerprint(),
        plaintext.len(),
    ))
}

/// Reverse [`encrypt_armored`] with the recipient's unprotected secret key
pub fn decrypt_armored(secret_key: &SignedSecretKey, armored: &str) -> BackupResult<Zeroizing<Vec<u8>>> {
    let (message, _headers) = Message::from_string(armored)
        .map_err(|e| BackupError::InvalidArmor(e.to_string()))?;

    let (decrypted, _key_ids) = message
        .decrypt(String::new, &[secret_key])
        .map_err(|e| BackupError::Decryption(e.to_string()))?;

    let content = decrypted
        .get_content()
        .map_err(|e| BackupError::Decryption(e.to_string()))?
        .ok_or_else(|| BackupError::Decryption("message has no literal data".to_string()))?;

    Ok(Zeroizing::new(content))
}
