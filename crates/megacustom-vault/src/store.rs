//! Credential store implementation

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use megacustom_core::domain::newtypes::{AccountId, SessionToken};
use megacustom_core::ports::cloud_client::CloudClient;

/// Blob format version
const FORMAT_VERSION: u8 = 1;

/// AES-GCM nonce length in bytes (96 bits)
const NONCE_LENGTH: usize = 12;

/// Length of the per-install secret
const INSTALL_SECRET_LENGTH: usize = 32;

/// HKDF info string binding derived keys to this store
const KEY_INFO: &[u8] = b"megacustom credential vault v1";

/// Errors raised by the credential store
#[derive(Debug, Error)]
pub enum VaultError {
    /// No token stored for the account
    #[error("No stored session for account {0}")]
    NotFound(AccountId),

    /// Stored blob failed to decrypt or parse; the token is unusable and the
    /// user must log in again
    #[error("Stored session for account {0} is corrupt: {1}")]
    Corrupt(AccountId, String),

    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session restore rejected by the cloud service: {0}")]
    Rejected(megacustom_core::Error),
}

/// Encrypted session-token store keyed by account id
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Open (or initialise) the store rooted at `dir`
    ///
    /// Creates the directory and the per-install secret on first use.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let store = Self { dir };
        store.ensure_install_secret()?;
        Ok(store)
    }

    /// Default location under the application config directory
    pub fn default_dir() -> PathBuf {
        megacustom_core::config::config_dir().join("credentials")
    }

    /// Encrypt and persist a session token for an account
    pub fn store(&self, id: AccountId, token: &SessionToken) -> Result<(), VaultError> {
        let key = self.derive_key(id)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| std::io::Error::other(format!("rng failure: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, token.as_bytes())
            .map_err(|e| std::io::Error::other(format!("encrypt failure: {e}")))?;

        let mut blob = Vec::with_capacity(1 + NONCE_LENGTH + ciphertext.len());
        blob.push(FORMAT_VERSION);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        let path = self.token_path(id);
        std::fs::write(&path, blob)?;
        restrict_permissions(&path)?;
        debug!(account = %id, "Stored encrypted session token");
        Ok(())
    }

    /// Decrypt the stored token and restore the client's session with it
    ///
    /// The plaintext token is consumed by `login_with_session` and never
    /// returned. A corrupt blob is discarded with a warning so the next
    /// attempt prompts a fresh login.
    pub async fn restore_session(
        &self,
        id: AccountId,
        client: &dyn CloudClient,
    ) -> Result<(), VaultError> {
        let token = match self.load(id) {
            Ok(token) => token,
            Err(VaultError::Corrupt(id, reason)) => {
                warn!(account = %id, reason = %reason, "Discarding corrupt session token");
                let _ = self.delete(id);
                return Err(VaultError::Corrupt(id, reason));
            }
            Err(e) => return Err(e),
        };
        client
            .login_with_session(&token)
            .await
            .map_err(VaultError::Rejected)
    }

    /// Remove the stored token for an account
    pub fn delete(&self, id: AccountId) -> Result<(), VaultError> {
        let path = self.token_path(id);
        if !path.exists() {
            return Err(VaultError::NotFound(id));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Ids of every account with a stored token
    pub fn list_account_ids(&self) -> Result<Vec<AccountId>, VaultError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".bin") else {
                continue;
            };
            if let Ok(id) = AccountId::parse(stem) {
                ids.push(id);
            }
        }
        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }

    fn load(&self, id: AccountId) -> Result<SessionToken, VaultError> {
        let path = self.token_path(id);
        if !path.exists() {
            return Err(VaultError::NotFound(id));
        }
        let blob = std::fs::read(&path)?;

        if blob.len() < 1 + NONCE_LENGTH {
            return Err(VaultError::Corrupt(id, "blob too short".to_string()));
        }
        if blob[0] != FORMAT_VERSION {
            return Err(VaultError::Corrupt(
                id,
                format!("unsupported format version {}", blob[0]),
            ));
        }

        let key = self.derive_key(id)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let nonce = Nonce::from_slice(&blob[1..1 + NONCE_LENGTH]);

        let plaintext = cipher
            .decrypt(nonce, &blob[1 + NONCE_LENGTH..])
            .map_err(|_| VaultError::Corrupt(id, "authentication failed".to_string()))?;

        Ok(SessionToken::new(plaintext))
    }

    fn token_path(&self, id: AccountId) -> PathBuf {
        self.dir.join(format!("{id}.bin"))
    }

    fn install_secret_path(&self) -> PathBuf {
        self.dir.join("install.key")
    }

    fn ensure_install_secret(&self) -> Result<(), VaultError> {
        let path = self.install_secret_path();
        if path.exists() {
            return Ok(());
        }
        let mut secret = [0u8; INSTALL_SECRET_LENGTH];
        getrandom::getrandom(&mut secret)
            .map_err(|e| std::io::Error::other(format!("rng failure: {e}")))?;
        std::fs::write(&path, secret)?;
        restrict_permissions(&path)?;
        debug!("Created per-install vault secret");
        Ok(())
    }

    /// Derive the per-account AES key from the install secret
    ///
    /// The account id is mixed into the HKDF salt so two accounts never share
    /// a key even under the same install secret.
    fn derive_key(&self, id: AccountId) -> Result<[u8; 32], VaultError> {
        let secret = std::fs::read(self.install_secret_path())?;
        if secret.len() != INSTALL_SECRET_LENGTH {
            return Err(VaultError::Corrupt(
                id,
                "install secret has unexpected length".to_string(),
            ));
        }
        let salt = id.to_string();
        let hk = Hkdf::<Sha256>::new(Some(salt.as_bytes()), &secret);
        let mut key = [0u8; 32];
        hk.expand(KEY_INFO, &mut key)
            .map_err(|e| std::io::Error::other(format!("hkdf failure: {e}")))?;
        Ok(key)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
