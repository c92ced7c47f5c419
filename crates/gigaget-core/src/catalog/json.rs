//! Catalog persisted as one JSON file (`~/.local/state/gigaget/missions.json`).
//!
//! Only identity and creation data are stored here; progress lives in each
//! mission's checkpoint and is picked up again on load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{CatalogError, MissionCatalog, MissionKey};
use crate::config::GigagetConfig;
use crate::manager::ManagedMission;
use crate::mission::{Mission, MissionBuilder};
use crate::storage;

/// One stored mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub url: String,
    pub location: PathBuf,
    pub name: String,
    pub timestamp: u64,
    pub worker_count: usize,
    pub block_size: u64,
    /// Set once the download completed; its checkpoint is gone by then.
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub length: u64,
}

impl CatalogEntry {
    fn from_mission(mission: &Mission) -> Self {
        let record = mission.record();
        Self {
            url: record.url,
            location: record.location,
            name: record.name,
            timestamp: record.timestamp,
            worker_count: record.worker_count,
            block_size: record.block_size,
            finished: record.finished,
            length: record.length,
        }
    }

    fn key(&self) -> MissionKey {
        MissionKey {
            location: self.location.clone(),
            name: self.name.clone(),
        }
    }

    fn to_mission(&self, cfg: &GigagetConfig) -> Result<Mission> {
        let builder = MissionBuilder::new(self.url.clone(), self.location.clone(), self.name.clone())
            .config(cfg)
            .block_size(self.block_size)
            .worker_count(self.worker_count)
            .timestamp(self.timestamp);
        if self.finished {
            return Ok(builder.completed(self.length).build()?);
        }
        builder.restore()
    }
}

pub struct JsonCatalog {
    path: PathBuf,
    cfg: GigagetConfig,
    entries: Vec<CatalogEntry>,
}

impl JsonCatalog {
    /// Default path: `~/.local/state/gigaget/missions.json`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("gigaget")?;
        Ok(xdg_dirs.get_state_home().join("gigaget").join("missions.json"))
    }

    pub fn open_default(cfg: GigagetConfig) -> Result<Self> {
        Self::open_at(Self::default_path()?, cfg)
    }

    /// Open the catalog at `path`; a missing file is an empty catalog.
    /// `cfg` supplies transfer settings for the missions it loads.
    pub fn open_at(path: impl AsRef<Path>, cfg: GigagetConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parse mission catalog: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).with_context(|| format!("read mission catalog: {}", path.display())),
        };
        Ok(Self { path, cfg, entries })
    }

    fn position(&self, key: &MissionKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key() == key)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&self.entries).context("serialize mission catalog")?;
        storage::write_atomic(&self.path, &json)
    }
}

impl MissionCatalog<Mission> for JsonCatalog {
    /// Entries that can no longer be turned into a mission (bad checkpoint,
    /// invalid identity) are skipped with a warning.
    fn load(&mut self) -> Result<Vec<Mission>, CatalogError> {
        let mut missions = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry.to_mission(&self.cfg) {
                Ok(m) => missions.push(m),
                Err(e) => tracing::warn!(mission = %entry.key(), "skipping catalog entry: {:#}", e),
            }
        }
        Ok(missions)
    }

    fn add(&mut self, mission: &Mission) -> Result<(), CatalogError> {
        let entry = CatalogEntry::from_mission(mission);
        match self.position(&entry.key()) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        self.save()?;
        Ok(())
    }

    fn update(&mut self, mission: &Mission) -> Result<(), CatalogError> {
        let key = mission.key();
        let i = self.position(&key).ok_or(CatalogError::NotAdded(key))?;
        self.entries[i] = CatalogEntry::from_mission(mission);
        self.save()?;
        Ok(())
    }

    fn delete(&mut self, mission: &Mission) -> Result<(), CatalogError> {
        let key = mission.key();
        let i = self.position(&key).ok_or(CatalogError::NotAdded(key))?;
        self.entries.remove(i);
        self.save()?;
        Ok(())
    }
}
