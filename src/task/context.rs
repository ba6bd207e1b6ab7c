//! Checksummed task-context snapshots.
//!
//! Execution context is saved as `context-{task_id}.json` with a metadata
//! header carrying a sha256 checksum over the payload. Loads verify the
//! checksum; a corrupt primary is repaired from the newest valid backup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Backup behavior for context snapshots.
#[derive(Debug, Clone)]
pub struct PersistenceOptions {
    pub auto_backup: bool,
    pub max_backups: usize,
    pub retention_days: u64,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            auto_backup: true,
            max_backups: 10,
            retention_days: 30,
        }
    }
}

/// Header stored alongside every context payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub id: Uuid,
    pub task_id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub size: usize,
    pub checksum: String,
}

#[derive(Serialize, Deserialize)]
struct ContextEnvelope {
    metadata: ContextMetadata,
    context: serde_json::Value,
}

/// Saves and restores per-task execution context.
pub struct ContextPersistence {
    base_dir: PathBuf,
    backup_dir: PathBuf,
    options: PersistenceOptions,
    persist_lock: Mutex<()>,
}

fn sanitize_id(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn checksum_of(context: &serde_json::Value) -> Result<String, String> {
    let bytes = serde_json::to_vec(context)
        .map_err(|e| format!("Failed to serialize context for checksum: {}", e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

impl ContextPersistence {
    pub async fn new(base_dir: PathBuf) -> Result<Self, String> {
        Self::with_options(base_dir, PersistenceOptions::default()).await
    }

    pub async fn with_options(
        base_dir: PathBuf,
        options: PersistenceOptions,
    ) -> Result<Self, String> {
        let backup_dir = base_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .await
            .map_err(|e| format!("Failed to create context dirs: {}", e))?;
        Ok(Self {
            base_dir,
            backup_dir,
            options,
            persist_lock: Mutex::new(()),
        })
    }

    fn context_path(&self, task_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("context-{}.json", sanitize_id(task_id)))
    }

    fn backup_prefix(&self, task_id: &str) -> String {
        format!("backup-{}-", sanitize_id(task_id))
    }

    /// Persist a context payload, bumping the version and backing up the
    /// previous snapshot when one exists.
    pub async fn save(
        &self,
        task_id: &str,
        context: &serde_json::Value,
    ) -> Result<ContextMetadata, String> {
        let _guard = self.persist_lock.lock().await;
        let path = self.context_path(task_id);

        let previous = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<ContextEnvelope>(&bytes).ok(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(format!("Failed to read existing context: {}", err));
            }
        };

        if previous.is_some() && self.options.auto_backup {
            self.backup_existing(task_id, &path).await?;
            self.prune_backups(task_id).await?;
        }

        let now = Utc::now();
        let checksum = checksum_of(context)?;
        let size = serde_json::to_vec(context)
            .map_err(|e| format!("Failed to serialize context: {}", e))?
            .len();
        let metadata = ContextMetadata {
            id: Uuid::new_v4(),
            task_id: task_id.to_string(),
            version: previous.as_ref().map(|p| p.metadata.version + 1).unwrap_or(1),
            created_at: previous
                .as_ref()
                .map(|p| p.metadata.created_at)
                .unwrap_or(now),
            last_modified: now,
            size,
            checksum,
        };

        let envelope = ContextEnvelope {
            metadata: metadata.clone(),
            context: context.clone(),
        };
        self.write_envelope(&path, &envelope).await?;

        tracing::debug!(
            task_id = %task_id,
            version = metadata.version,
            size = metadata.size,
            "Saved task context"
        );
        Ok(metadata)
    }

    /// Load a context payload, verifying its checksum. A corrupt primary is
    /// replaced by the newest backup that still verifies.
    pub async fn load(&self, task_id: &str) -> Result<Option<serde_json::Value>, String> {
        let path = self.context_path(task_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(format!("Failed to read context: {}", err)),
        };

        match parse_verified(&bytes) {
            Ok(envelope) => Ok(Some(envelope.context)),
            Err(reason) => {
                tracing::warn!(
                    task_id = %task_id,
                    reason = %reason,
                    "Context snapshot corrupt, attempting backup restore"
                );
                self.restore_from_backup(task_id, &path).await
            }
        }
    }

    /// Metadata for a saved context, without verifying the payload.
    pub async fn metadata(&self, task_id: &str) -> Result<Option<ContextMetadata>, String> {
        let path = self.context_path(task_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(format!("Failed to read context: {}", err)),
        };
        let envelope: ContextEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| format!("Failed to parse context: {}", e))?;
        Ok(Some(envelope.metadata))
    }

    pub async fn delete(&self, task_id: &str) -> Result<bool, String> {
        let path = self.context_path(task_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(format!("Failed to delete context: {}", err)),
        }
    }

    /// Metadata for every saved context, newest first.
    pub async fn list(&self) -> Result<Vec<ContextMetadata>, String> {
        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| format!("Failed to read context dir: {}", e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read context dir: {}", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("context-") || !name.ends_with(".json") {
                continue;
            }
            match fs::read(entry.path()).await {
                Ok(bytes) => {
                    if let Ok(envelope) = serde_json::from_slice::<ContextEnvelope>(&bytes) {
                        out.push(envelope.metadata);
                    }
                }
                Err(err) => {
                    tracing::warn!("Failed to read {}: {}", name, err);
                }
            }
        }
        out.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(out)
    }

    async fn write_envelope(&self, path: &PathBuf, envelope: &ContextEnvelope) -> Result<(), String> {
        let data = serde_json::to_vec_pretty(envelope)
            .map_err(|e| format!("Failed to serialize context: {}", e))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, data)
            .await
            .map_err(|e| format!("Failed to write context: {}", e))?;
        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| format!("Failed to finalize context: {}", e))?;
        Ok(())
    }

    async fn backup_existing(&self, task_id: &str, path: &PathBuf) -> Result<(), String> {
        let backup_name = format!(
            "{}{}-{}.json",
            self.backup_prefix(task_id),
            Utc::now().timestamp_millis(),
            Uuid::new_v4()
        );
        let backup_path = self.backup_dir.join(backup_name);
        fs::copy(path, &backup_path)
            .await
            .map_err(|e| format!("Failed to back up context: {}", e))?;
        Ok(())
    }

    async fn prune_backups(&self, task_id: &str) -> Result<(), String> {
        let mut backups = self.backups_for(task_id).await?;
        // Newest first by mtime
        backups.sort_by(|a, b| b.1.cmp(&a.1));

        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(self.options.retention_days * 86_400));

        for (index, (path, modified)) in backups.iter().enumerate() {
            let expired = cutoff.map(|c| *modified < c).unwrap_or(false);
            if index >= self.options.max_backups || expired {
                if let Err(err) = fs::remove_file(path).await {
                    tracing::warn!("Failed to prune backup {}: {}", path.display(), err);
                }
            }
        }
        Ok(())
    }

    async fn backups_for(&self, task_id: &str) -> Result<Vec<(PathBuf, SystemTime)>, String> {
        let prefix = self.backup_prefix(task_id);
        let mut entries = fs::read_dir(&self.backup_dir)
            .await
            .map_err(|e| format!("Failed to read backup dir: {}", e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&prefix) {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((entry.path(), modified));
        }
        Ok(out)
    }

    async fn restore_from_backup(
        &self,
        task_id: &str,
        primary: &PathBuf,
    ) -> Result<Option<serde_json::Value>, String> {
        let mut backups = self.backups_for(task_id).await?;
        backups.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in backups {
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            if let Ok(envelope) = parse_verified(&bytes) {
                let _guard = self.persist_lock.lock().await;
                self.write_envelope(primary, &envelope).await?;
                tracing::info!(
                    task_id = %task_id,
                    backup = %path.display(),
                    version = envelope.metadata.version,
                    "Restored task context from backup"
                );
                return Ok(Some(envelope.context));
            }
        }

        Err(format!(
            "Context for task {} is corrupt and no valid backup exists",
            task_id
        ))
    }
}

fn parse_verified(bytes: &[u8]) -> Result<ContextEnvelope, String> {
    let envelope: ContextEnvelope =
        serde_json::from_slice(bytes).map_err(|e| format!("parse error: {}", e))?;
    let actual = checksum_of(&envelope.context)?;
    if actual != envelope.metadata.checksum {
        return Err(format!(
            "checksum mismatch (expected {}, got {})",
            envelope.metadata.checksum, actual
        ));
    }
    Ok(envelope)
}
