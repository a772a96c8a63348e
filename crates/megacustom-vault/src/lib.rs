//! MegaCustom Vault - Encrypted session-token store
//!
//! Persists one encrypted session token per account under
//! `${CONFIG_DIR}/MegaCustom/credentials/<account-id>.bin`.
//!
//! ## Blob format
//!
//! ```text
//! [version = 1 : 1 byte][nonce : 12 bytes][AES-256-GCM ciphertext + tag]
//! ```
//!
//! The AES key is derived with HKDF-SHA256 from a 32-byte per-install secret
//! stored next to the credentials (`install.key`, mode 0600). Tokens never
//! leave the vault in plaintext: [`CredentialStore::restore_session`] decrypts
//! and hands the token straight to `CloudClient::login_with_session`.

mod store;

pub use store::{CredentialStore, VaultError};
