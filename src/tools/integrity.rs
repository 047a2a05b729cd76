//! Shared integrity-write protocol used by `write_file`, `replace`, and
//! `replace_in_file`.
//!
//! 1. Ensure the parent directory exists.
//! 2. If the target exists, back it up to `target.backup[.N]`.
//! 3. Write the new bytes to `target.tmp.<random>`.
//! 4. Hash the temp file and the intended bytes; they must match.
//! 5. Delete the old file (if any) and rename temp -> target atomically.
//! 6. Re-hash the target; must match.
//! 7. On any failure in 3-6, restore from backup.
//! 8. On success, delete the backup; the caller gets back the final sha256.

use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{AgentError, Result};

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn backup_path(target: &Path) -> PathBuf {
    let base = target.as_os_str().to_string_lossy().into_owned();
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            PathBuf::from(format!("{base}.backup"))
        } else {
            PathBuf::from(format!("{base}.backup.{n}"))
        };
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Run the full integrity-write protocol. Returns the sha256 of the bytes
/// now on disk at `target`.
pub async fn write_with_integrity(target: &Path, bytes: &[u8]) -> Result<String> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let backup = if target.exists() {
        let backup = backup_path(target);
        tokio::fs::copy(target, &backup).await?;
        Some(backup)
    } else {
        None
    };

    let result = write_and_verify(target, bytes).await;

    match result {
        Ok(final_hash) => {
            if let Some(backup) = backup {
                let _ = tokio::fs::remove_file(&backup).await;
            }
            Ok(final_hash)
        }
        Err(e) => {
            if let Some(backup) = backup {
                if let Err(restore_err) = tokio::fs::copy(&backup, target).await {
                    return Err(AgentError::IntegrityMismatch(format!(
                        "write failed ({e}); restore from backup also failed: {restore_err}"
                    )));
                }
                let _ = tokio::fs::remove_file(&backup).await;
            }
            Err(e)
        }
    }
}

async fn write_and_verify(target: &Path, bytes: &[u8]) -> Result<String> {
    let expected_hash = sha256_hex(bytes);

    let suffix: u64 = rand::thread_rng().gen();
    let tmp_path = target.with_file_name(format!(
        "{}.tmp.{suffix:x}",
        target.file_name().and_then(|f| f.to_str()).unwrap_or("file")
    ));

    tokio::fs::write(&tmp_path, bytes).await?;

    let tmp_bytes = tokio::fs::read(&tmp_path).await?;
    let tmp_hash = sha256_hex(&tmp_bytes);
    if tmp_hash != expected_hash {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(AgentError::IntegrityMismatch(
            "temp file hash did not match intended bytes".into(),
        ));
    }

    if target.exists() {
        tokio::fs::remove_file(target).await?;
    }
    tokio::fs::rename(&tmp_path, target).await?;

    let final_bytes = tokio::fs::read(target).await?;
    let final_hash = sha256_hex(&final_bytes);
    if final_hash != expected_hash {
        return Err(AgentError::IntegrityMismatch(
            "on-disk hash did not match intended bytes after rename".into(),
        ));
    }

    Ok(final_hash)
}
