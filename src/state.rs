//! Run-state store: the last configuration a server bound successfully with.

use std::io::ErrorKind;

use tokio::fs;

use crate::config::InstallRoot;
use crate::error::StateError;
use crate::types::ServerConfig;

#[derive(Debug, Clone)]
pub struct RunStateStore {
    root: InstallRoot,
}

impl RunStateStore {
    pub fn new(root: InstallRoot) -> Self {
        Self { root }
    }

    /// Replaces the stored record. The JSON is written to a sibling temp file
    /// and renamed over the old one, so a crash mid-write leaves the previous
    /// record intact.
    pub async fn save(&self, config: &ServerConfig) -> Result<(), StateError> {
        let dir = self.root.temp_dir();
        fs::create_dir_all(&dir).await?;

        let target = self.root.state_path();
        let staging = target.with_extension("json.tmp");
        let body = serde_json::to_vec(config)?;
        fs::write(&staging, body).await?;
        fs::rename(&staging, &target).await?;
        Ok(())
    }

    /// Returns `Ok(None)` when nothing has been saved yet.
    pub async fn load(&self) -> Result<Option<ServerConfig>, StateError> {
        let bytes = match fs::read(self.root.state_path()).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[tokio::test]
    async fn load_before_save_is_absent() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(InstallRoot::new(dir.path()));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites_previous_record() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let store = RunStateStore::new(root.clone());

        let first = ServerConfig {
            root_path: PathBuf::from("/first"),
            port: 8000,
        };
        let second = ServerConfig {
            root_path: PathBuf::from("/site"),
            port: 8080,
        };
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(second));
        let raw = std::fs::read_to_string(root.state_path()).unwrap();
        assert_eq!(raw, r#"{"serverPath":"/site","port":8080}"#);
        assert!(!root.state_path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn reads_record_written_by_earlier_versions() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        std::fs::create_dir_all(root.temp_dir()).unwrap();
        std::fs::write(root.state_path(), r#"{"serverPath":"/srv/www","port":443}"#).unwrap();

        let loaded = RunStateStore::new(root).load().await.unwrap().unwrap();
        assert_eq!(loaded.root_path, PathBuf::from("/srv/www"));
        assert_eq!(loaded.port, 443);
    }

    #[tokio::test]
    async fn corrupt_record_is_an_error() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        std::fs::create_dir_all(root.temp_dir()).unwrap();
        std::fs::write(root.state_path(), "{not json").unwrap();

        let err = RunStateStore::new(root).load().await.unwrap_err();
        assert!(matches!(err, StateError::Json(_)));
    }
}
