//! Process runtime identity.
//!
//! The engine id is created once per installation and persisted to a
//! well-known file under the data directory. The value is read exactly
//! once at process start and injected where needed; nothing re-reads
//! the file afterwards.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const ID_FILE: &str = "engine.id";

/// Process-scoped runtime identity, created once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub id: String,
    pub data_dir: PathBuf,
}

impl RuntimeInfo {
    /// Load the persisted engine id, generating and persisting a new one
    /// on first start.
    pub fn create(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        let id_path = data_dir.join(ID_FILE);
        let id = if id_path.exists() {
            std::fs::read_to_string(&id_path)
                .with_context(|| format!("Failed to read engine id: {}", id_path.display()))?
                .trim()
                .to_string()
        } else {
            let id = uuid::Uuid::new_v4().to_string();
            std::fs::write(&id_path, &id)
                .with_context(|| format!("Failed to write engine id: {}", id_path.display()))?;
            id
        };
        Ok(Self {
            id,
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Path of the pipeline state database under the data directory.
    #[must_use]
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_created_once_and_stable_across_restarts() {
        let dir = std::env::temp_dir().join(format!("edgetide-rti-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();

        let first = RuntimeInfo::create(&dir).unwrap();
        assert!(!first.id.is_empty());
        let second = RuntimeInfo::create(&dir).unwrap();
        assert_eq!(first.id, second.id);

        std::fs::remove_dir_all(&dir).ok();
    }
}
