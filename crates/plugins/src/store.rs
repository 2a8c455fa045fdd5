//! On-disk persistence: one JSON file per plugin manifest.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{Error, PluginManifest, Result};

/// Directory-backed manifest store. Files are named `<plugin>.json`; an
/// existing file is never overwritten.
#[derive(Debug, Clone)]
pub struct PluginStore {
    dir: PathBuf,
}

impl PluginStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Load every manifest in the directory, skipping unreadable files.
    pub fn load_all(&self) -> Result<Vec<PluginManifest>> {
        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(&path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping bad manifest"),
            }
        }
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(manifests)
    }

    fn load_file(path: &Path) -> Result<PluginManifest> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist a manifest. Fails if a plugin of that name already exists
    /// on disk.
    pub fn save(&self, manifest: &PluginManifest) -> Result<()> {
        let path = self.path_for(&manifest.name);
        if path.exists() {
            return Err(Error::message(format!(
                "plugin '{}' already exists",
                manifest.name
            )));
        }
        let raw = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, raw)?;
        info!(name = %manifest.name, "plugin saved");
        Ok(())
    }

    /// Delete a persisted manifest.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(Error::message(format!("plugin '{name}' not found")));
        }
        std::fs::remove_file(&path)?;
        info!(name, "plugin removed");
        Ok(())
    }
}
