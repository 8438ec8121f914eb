//! # Vault Module
//!
//! At-rest obfuscation of the copied Open WebUI database.
//!
//! **This is not encryption.** The transform is a repeating-key XOR with a
//! key derived from the home directory path, which is low entropy and the
//! same for every file on a machine. There is no integrity check. It only
//! keeps the database from being readable at a glance (e.g. by `strings` or a
//! file previewer). Do not rely on it to protect anything.
//!
//! Temporary plaintext copies are overwritten with random bytes before
//! removal. That is best effort: journaling and copy-on-write filesystems or
//! SSD wear levelling may keep the old blocks around.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of the derived key in bytes.
pub const KEY_LEN: usize = 32;
/// Extension appended to an obfuscated file.
pub const OBFUSCATED_EXTENSION: &str = "enc";
/// Extension of the short-lived plaintext copy.
pub const TEMP_EXTENSION: &str = "tmp";

const KEY_SALT: &[u8] = b"ollama_viewer_salt_v1";
const KEY_PREFIX: &str = "ollama_viewer_";
const KEY_ROUNDS: u32 = 100_000;
const SHRED_CHUNK: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Could not determine the home directory")]
    NoHomeDir,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> VaultError + '_ {
    move |source| VaultError::Io { path: path.to_path_buf(), source }
}

/// Fixed-length obfuscation key.
#[derive(Clone, PartialEq, Eq)]
pub struct ObfuscationKey([u8; KEY_LEN]);

impl std::fmt::Debug for ObfuscationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ObfuscationKey(..)")
    }
}

impl ObfuscationKey {
    /// Derives the key from a home directory path.
    ///
    /// `sha256(home)` is hex encoded and truncated to 16 characters, prefixed
    /// with `ollama_viewer_`, stretched with PBKDF2-HMAC-SHA256 and finally
    /// base64 encoded; the first 32 characters are the key.
    pub fn derive(home: &Path) -> Self {
        let digest = Sha256::digest(home.to_string_lossy().as_bytes());
        let machine_id = &hex::encode(digest)[..16];
        let material = format!("{}{}", KEY_PREFIX, machine_id);

        let mut stretched = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(material.as_bytes(), KEY_SALT, KEY_ROUNDS, &mut stretched);

        let encoded = STANDARD.encode(stretched);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&encoded.as_bytes()[..KEY_LEN]);
        Self(key)
    }

    /// Key for the current user's home directory.
    pub fn for_current_user() -> Result<Self, VaultError> {
        let home = dirs::home_dir().ok_or(VaultError::NoHomeDir)?;
        Ok(Self::derive(&home))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// XORs `data` with the repeating key. Applying it twice restores the input.
    pub fn apply(&self, data: &mut [u8]) {
        for (byte, key) in data.iter_mut().zip(self.0.iter().cycle()) {
            *byte ^= key;
        }
    }
}

/// `webui.db` -> `webui.db.enc`
pub fn obfuscated_path(plain: &Path) -> PathBuf {
    append_extension(plain, OBFUSCATED_EXTENSION)
}

/// `webui.db.enc` -> `webui.db.tmp`
pub fn temp_path(obfuscated: &Path) -> PathBuf {
    obfuscated.with_extension(TEMP_EXTENSION)
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Obfuscates `plain` into its `.enc` sibling and deletes the plaintext.
pub fn obfuscate_file(plain: &Path, key: &ObfuscationKey) -> Result<PathBuf, VaultError> {
    let mut data = fs::read(plain).map_err(io_error(plain))?;
    key.apply(&mut data);

    let target = obfuscated_path(plain);
    fs::write(&target, &data).map_err(io_error(&target))?;
    fs::remove_file(plain).map_err(io_error(plain))?;

    info!("Database obfuscated to {}", target.display());
    Ok(target)
}

/// A plaintext copy that is shredded when dropped.
#[derive(Debug)]
pub struct RevealedFile {
    path: PathBuf,
}

impl RevealedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RevealedFile {
    fn drop(&mut self) {
        if let Err(e) = shred(&self.path) {
            warn!("Failed to clean up temporary database {}: {}", self.path.display(), e);
        }
    }
}

/// Writes a plaintext copy of `obfuscated` next to it.
///
/// The copy lives as long as the returned guard.
pub fn reveal_to_temp(obfuscated: &Path, key: &ObfuscationKey) -> Result<RevealedFile, VaultError> {
    let mut data = fs::read(obfuscated).map_err(io_error(obfuscated))?;
    key.apply(&mut data);

    // built before writing: dropping it on error shreds a partial copy
    let revealed = RevealedFile { path: temp_path(obfuscated) };
    write_plaintext(&revealed.path, &data)?;
    debug!("Revealed database to {}", revealed.path.display());
    Ok(revealed)
}

fn write_plaintext(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let mut file = fs::File::create(path).map_err(io_error(path))?;
    file.write_all(data).map_err(io_error(path))?;
    file.sync_all().map_err(io_error(path))
}

/// Overwrites `path` with random bytes, then removes it.
pub fn shred(path: &Path) -> Result<(), VaultError> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io_error(path)(e)),
    };

    let mut file = OpenOptions::new().write(true).open(path).map_err(io_error(path))?;
    let mut rng = rand::rng();
    let mut buffer = vec![0u8; SHRED_CHUNK];
    let mut remaining = len;
    while remaining > 0 {
        let chunk = remaining.min(SHRED_CHUNK as u64) as usize;
        rng.fill_bytes(&mut buffer[..chunk]);
        file.write_all(&buffer[..chunk]).map_err(io_error(path))?;
        remaining -= chunk as u64;
    }
    file.sync_all().map_err(io_error(path))?;
    drop(file);

    fs::remove_file(path).map_err(io_error(path))?;
    debug!("Shredded {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ObfuscationKey {
        ObfuscationKey::derive(Path::new("/home/tester"))
    }

    #[test]
    fn test_key_is_deterministic_ascii() {
        let a = key();
        let b = key();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), KEY_LEN);
        assert!(a.as_bytes().iter().all(|b| b.is_ascii()));
        assert_ne!(a, ObfuscationKey::derive(Path::new("/home/other")));
    }

    #[test]
    fn test_apply_is_self_inverse() {
        let key = key();
        let original: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut data = original.clone();
        key.apply(&mut data);
        assert_ne!(data, original);
        key.apply(&mut data);
        assert_eq!(data, original);

        let mut empty: Vec<u8> = Vec::new();
        key.apply(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_file_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("webui.db");
        let content = b"SQLite format 3\0 some rows".to_vec();
        fs::write(&plain, &content).unwrap();

        let obfuscated = obfuscate_file(&plain, &key()).unwrap();
        assert_eq!(obfuscated, dir.path().join("webui.db.enc"));
        assert!(!plain.exists());
        assert_ne!(fs::read(&obfuscated).unwrap(), content);

        let temp = dir.path().join("webui.db.tmp");
        {
            let revealed = reveal_to_temp(&obfuscated, &key()).unwrap();
            assert_eq!(revealed.path(), temp.as_path());
            assert_eq!(fs::read(revealed.path()).unwrap(), content);
        }
        assert!(!temp.exists());
        assert!(obfuscated.exists());
    }

    #[test]
    fn test_empty_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("webui.db");
        fs::write(&plain, b"").unwrap();

        let obfuscated = obfuscate_file(&plain, &key()).unwrap();
        let revealed = reveal_to_temp(&obfuscated, &key()).unwrap();
        assert!(fs::read(revealed.path()).unwrap().is_empty());
    }

    #[test]
    fn test_dropped_guard_shreds_partial_copy() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("webui.db.tmp");
        fs::write(&temp, b"SQLite format 3\0 half a page").unwrap();

        drop(RevealedFile { path: temp.clone() });
        assert!(!temp.exists());
    }

    #[test]
    fn test_failed_reveal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("webui.db");
        fs::write(&plain, b"rows").unwrap();
        let obfuscated = obfuscate_file(&plain, &key()).unwrap();
        // a directory in the way makes the plaintext write fail
        fs::create_dir(dir.path().join("webui.db.tmp")).unwrap();

        assert!(matches!(reveal_to_temp(&obfuscated, &key()), Err(VaultError::Io { .. })));
        assert!(obfuscated.exists());
    }

    #[test]
    fn test_shred_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(shred(&dir.path().join("absent.tmp")).is_ok());
    }
}
