use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the persisted user state inside the home directory.
pub const STARRED_FILE_NAME: &str = ".ollama_model_viewer_config.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize starred models: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk layout of the persisted user state.
#[derive(Debug, Serialize, Deserialize, Default)]
struct StarredFile {
    #[serde(default)]
    starred_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// The set of starred model names, backed by a JSON file.
///
/// Only the starred set is persisted. Deletion queue and usage data live in
/// the session and are lost on restart.
#[derive(Debug, Clone)]
pub struct StarredStore {
    path: PathBuf,
    starred: BTreeSet<String>,
}

impl StarredStore {
    /// `~/.ollama_model_viewer_config.json`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(STARRED_FILE_NAME))
    }

    /// Loads the store from `path`.
    ///
    /// A missing file yields an empty set. An unreadable or corrupt file is
    /// logged and also yields an empty set; it is overwritten on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let starred = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StarredFile>(&content) {
                Ok(file) => file.starred_models.into_iter().collect(),
                Err(e) => {
                    warn!("Could not parse starred models at {}: {}", path.display(), e);
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No starred models file at {}", path.display());
                BTreeSet::new()
            }
            Err(e) => {
                warn!("Could not read starred models at {}: {}", path.display(), e);
                BTreeSet::new()
            }
        };

        info!("Loaded {} starred models", starred.len());
        Self { path, starred }
    }

    /// Writes the starred set with a fresh `last_updated` timestamp.
    pub fn save(&self) -> Result<(), StoreError> {
        let file = StarredFile {
            starred_models: self.starred.iter().cloned().collect(),
            last_updated: Some(Utc::now().to_rfc3339()),
        };
        let content = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(&self.path, content).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved {} starred models to {}", self.starred.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.starred.contains(name)
    }

    /// Flips the star on `name` and returns the new state.
    pub fn toggle(&mut self, name: &str) -> bool {
        if self.starred.remove(name) {
            false
        } else {
            self.starred.insert(name.to_string());
            true
        }
    }

    pub fn insert(&mut self, name: &str) -> bool {
        self.starred.insert(name.to_string())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.starred.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.starred.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.starred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starred.is_empty()
    }
}
