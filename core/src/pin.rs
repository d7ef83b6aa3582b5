//! PIN input, credential storage and verification.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AuthConfig;
use crate::error::{CredentialError, PinInputError};

/// Number of digits in a PIN.
pub const PIN_LENGTH: usize = 4;

/// PIN entry buffer. Holds at most [`PIN_LENGTH`] ASCII digits.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct PinBuffer {
    digits: [u8; PIN_LENGTH],
    len: usize,
}

impl fmt::Debug for PinBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinBuffer").field("len", &self.len).finish()
    }
}

impl PinBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete or partial PIN, rejecting non-digits and overflow.
    pub fn parse(text: &str) -> Result<Self, PinInputError> {
        let mut buffer = Self::new();
        for c in text.chars() {
            buffer.push(c)?;
        }
        Ok(buffer)
    }

    /// Keep the first [`PIN_LENGTH`] digits of `text` and drop everything else.
    pub fn sanitize(text: &str) -> Self {
        let mut buffer = Self::new();
        for c in text.chars().filter(char::is_ascii_digit) {
            if buffer.push(c).is_err() {
                break;
            }
        }
        buffer
    }

    /// Append one digit.
    pub fn push(&mut self, c: char) -> Result<(), PinInputError> {
        if !c.is_ascii_digit() {
            return Err(PinInputError::NotADigit);
        }
        if self.len >= PIN_LENGTH {
            return Err(PinInputError::TooLong(PIN_LENGTH));
        }
        // ASCII digit, so the cast is lossless.
        self.digits[self.len] = c as u8;
        self.len += 1;
        Ok(())
    }

    /// Remove the last digit.
    pub fn pop(&mut self) {
        if self.len > 0 {
            self.len -= 1;
            self.digits[self.len] = 0;
        }
    }

    pub fn clear(&mut self) {
        self.digits.zeroize();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exactly [`PIN_LENGTH`] digits entered.
    pub fn is_complete(&self) -> bool {
        self.len == PIN_LENGTH
    }

    /// Require a full PIN.
    pub fn ensure_complete(&self) -> Result<(), PinInputError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(PinInputError::Incomplete(PIN_LENGTH))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.digits[..self.len]
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

/// Argon2id hash of the PIN in PHC string format.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PinCredential {
    hash: String,
}

impl fmt::Debug for PinCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PinCredential(<redacted>)")
    }
}

impl PinCredential {
    /// Hash a complete PIN with a fresh salt.
    pub fn hash_pin(pin: &PinBuffer) -> Result<Self, CredentialError> {
        pin.ensure_complete()
            .map_err(|e| CredentialError::Hash(e.to_string()))?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?
            .to_string();

        Ok(Self { hash })
    }

    /// Wrap an existing PHC hash string after checking it parses.
    pub fn from_hash(hash: String) -> Result<Self, CredentialError> {
        PasswordHash::new(&hash).map_err(|e| CredentialError::InvalidHash(e.to_string()))?;
        Ok(Self { hash })
    }

    /// Check a candidate against the stored hash.
    pub fn matches(&self, candidate: &PinBuffer) -> Result<bool, CredentialError> {
        let parsed =
            PasswordHash::new(&self.hash).map_err(|e| CredentialError::InvalidHash(e.to_string()))?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::InvalidHash(e.to_string())),
        }
    }
}

/// Where the verifier resolves the credential from at verification time.
pub trait CredentialSource: Send + Sync {
    fn load(&self) -> Result<Option<PinCredential>, CredentialError>;
}

impl CredentialSource for PinCredential {
    fn load(&self) -> Result<Option<PinCredential>, CredentialError> {
        Ok(Some(self.clone()))
    }
}

/// On-disk credential format.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    hash: String,
    updated_at: DateTime<Utc>,
}

/// Per-user credential file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the location named by the configuration.
    pub fn from_config(config: &AuthConfig) -> Result<Self, CredentialError> {
        config
            .credential_path()
            .map(Self::new)
            .ok_or(CredentialError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a credential file is present.
    pub fn is_configured(&self) -> bool {
        self.path.is_file()
    }

    /// Last time the credential was written, if any.
    pub fn updated_at(&self) -> Result<Option<DateTime<Utc>>, CredentialError> {
        Ok(self.read()?.map(|stored| stored.updated_at))
    }

    /// Persist a credential, replacing any previous one.
    pub fn save(&self, credential: &PinCredential) -> Result<(), CredentialError> {
        let stored = StoredCredential {
            hash: credential.hash.clone(),
            updated_at: Utc::now(),
        };
        let contents = zeroize::Zeroizing::new(serde_json::to_string_pretty(&stored)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&self.path, contents.as_bytes())?;
        info!("Stored PIN credential at {}", self.path.display());
        Ok(())
    }

    /// Remove the credential. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed PIN credential at {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Result<Option<StoredCredential>, CredentialError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => zeroize::Zeroizing::new(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

impl CredentialSource for FileCredentialStore {
    fn load(&self) -> Result<Option<PinCredential>, CredentialError> {
        match self.read()? {
            Some(stored) => PinCredential::from_hash(stored.hash.clone()).map(Some),
            None => {
                debug!("No credential file at {}", self.path.display());
                Ok(None)
            }
        }
    }
}

/// Atomically writes data to a file using a temporary file and rename.
/// The result is readable by the owner only.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("medremind");
    let temp_path = parent.join(format!(".{}.{}-{}.tmp", file_name, pid, timestamp));

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(&temp_path)?;

    // Anything failing past this point must not leave the temp file behind.
    let written = file
        .write_all(data)
        .and_then(|_| file.sync_all())
        .and_then(|_| fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)))
        .and_then(|_| fs::rename(&temp_path, path));
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    // Sync directory for durability
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Why a PIN was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFailure {
    Mismatch,
    NotConfigured,
}

/// Result of one PIN comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Success,
    Failure(PinFailure),
}

/// Compares candidates against the credential resolved from its source.
#[derive(Clone)]
pub struct PinVerifier {
    source: Arc<dyn CredentialSource>,
}

impl PinVerifier {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self { source }
    }

    /// Verify a candidate. Store errors are returned, mismatches are not errors.
    pub fn verify(&self, candidate: &PinBuffer) -> Result<PinOutcome, CredentialError> {
        if !candidate.is_complete() {
            warn!("Rejecting incomplete PIN ({} digits)", candidate.len());
            return Ok(PinOutcome::Failure(PinFailure::Mismatch));
        }

        let Some(credential) = self.source.load()? else {
            warn!("PIN verification requested but no credential is stored");
            return Ok(PinOutcome::Failure(PinFailure::NotConfigured));
        };

        if credential.matches(candidate)? {
            info!("PIN accepted");
            Ok(PinOutcome::Success)
        } else {
            info!("PIN rejected");
            Ok(PinOutcome::Failure(PinFailure::Mismatch))
        }
    }
}

impl fmt::Debug for PinVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinVerifier").finish_non_exhaustive()
    }
}
