//! Core services for the backup pipeline
//!
//! Each stage of a backup run is a service here; the service traits are the
//! seams where AWS is swapped for in-memory stubs in tests.
//!
//! ## Available Services
//!
//! ### Keyring
//! - `Keyring` - ephemeral OpenPGP recipient keyring with SHA-256 fingerprints
//!
//! ### Armor
//! - `encrypt_armored` / `decrypt_armored` - armored OpenPGP messages
//!
//! ### Parameters
//! - `ParameterSource` - paginated listing and batched value fetch
//!
//! ### Storage
//! - `ObjectSink` - uploads to buckets in several regions

pub mod armor;
pub mod keyring;
pub mod parameters;
pub mod storage;

pub use armor::{EncryptedArtifact, EncryptionReport, decrypt_armored, encrypt_armored};
pub use keyring::{EncryptionKey, ImportResult, Keyring, RecipientKey, verify_pin};
pub use parameters::{FetchedBatch, ParameterPage, ParameterSource, enumerate, fetch_values};
pub use storage::{ObjectSink, date_stamp, object_key, upload_all};
