//! Manager operations that create and watch real network missions.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{ManagerError, MissionManager};
use crate::catalog::{MissionCatalog, MissionKey};
use crate::checkpoint::{CheckpointStore, CHECKPOINT_EXTENSION};
use crate::config::GigagetConfig;
use crate::listener::{EventLoop, MissionListener};
use crate::mission::{Mission, MissionBuilder};
use crate::naming;
use crate::storage;

/// Writes a mission's final state back to the catalog when it finishes or fails.
struct CatalogSync<C> {
    catalog: Weak<Mutex<C>>,
}

impl<C: MissionCatalog<Mission>> CatalogSync<C> {
    fn sync(&self, mission: &Mission) {
        let Some(catalog) = self.catalog.upgrade() else {
            return;
        };
        let mut catalog = catalog.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = catalog.update(mission) {
            tracing::warn!(mission = %mission.name(), "catalog update failed: {:#}", e);
        }
    }
}

impl<C: MissionCatalog<Mission> + Send> MissionListener for CatalogSync<C> {
    fn on_progress(&self, _mission: &Mission, _done: u64, _total: u64) {}

    fn on_finish(&self, mission: &Mission) {
        self.sync(mission);
    }

    fn on_error(&self, mission: &Mission, _code: i32) {
        self.sync(mission);
    }
}

impl<C> MissionManager<Mission, C>
where
    C: MissionCatalog<Mission> + Send + 'static,
{
    /// Load `catalog` and keep it updated from mission events.
    pub fn open(catalog: C, config: GigagetConfig) -> Result<Self, ManagerError> {
        let mut manager = Self::new(catalog)?.with_config(config);
        let events = EventLoop::new("gigaget-catalog").context("start catalog event loop")?;
        manager.events = Some(Arc::new(events));
        for mission in &manager.missions {
            manager.watch(mission);
        }
        Ok(manager)
    }

    fn watch(&self, mission: &Mission) {
        if let Some(events) = &self.events {
            let sync = CatalogSync {
                catalog: Arc::downgrade(&self.catalog),
            };
            mission.add_listener(Arc::new(sync), Arc::clone(events));
        }
    }

    fn is_taken(&self, location: &Path, name: &str) -> bool {
        location.join(name).exists()
            || CheckpointStore::for_mission(location, name).exists()
            || self
                .position(&MissionKey {
                    location: location.to_path_buf(),
                    name: name.to_string(),
                })
                .is_some()
    }

    /// Create, register and start a mission; returns its index.
    ///
    /// With `overwrite` an existing file, checkpoint or managed mission of the
    /// same name is discarded first. Without it the name gets a ` (n)` suffix
    /// until it is free.
    pub fn start_mission(
        &mut self,
        url: &str,
        location: impl Into<PathBuf>,
        name: &str,
        overwrite: bool,
        worker_count: usize,
    ) -> Result<usize, ManagerError> {
        let location = location.into();
        let name = if overwrite {
            self.discard(&location, name)?;
            name.to_string()
        } else {
            naming::unique_name(name, |candidate| self.is_taken(&location, candidate))
        };

        let mission = MissionBuilder::new(url, &location, &name)
            .config(&self.config)
            .worker_count(worker_count)
            .build()?;
        std::fs::create_dir_all(&location)
            .with_context(|| format!("create download dir: {}", location.display()))?;
        let index = self.add_mission(mission.clone())?;
        self.watch(&mission);
        tracing::info!(mission = %mission.name(), url, index, "mission created");
        mission.start();
        Ok(index)
    }

    /// Remove whatever occupies `location/name` before an overwrite.
    fn discard(&mut self, location: &Path, name: &str) -> Result<(), ManagerError> {
        let key = MissionKey {
            location: location.to_path_buf(),
            name: name.to_string(),
        };
        if let Some(index) = self.position(&key) {
            self.pause_mission(index)?;
            return self.delete_mission(index);
        }
        storage::remove_if_exists(&location.join(name))?;
        CheckpointStore::for_mission(location, name).remove()?;
        Ok(())
    }

    /// Register every checkpoint in `location` that no managed mission owns.
    /// Returns how many missions were adopted.
    pub fn adopt_checkpoints(&mut self, location: &Path) -> Result<usize, ManagerError> {
        let entries = std::fs::read_dir(location)
            .with_context(|| format!("read download dir: {}", location.display()))?;
        let mut adopted = 0;
        for entry in entries {
            let path = entry.context("read dir entry")?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHECKPOINT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = MissionKey {
                location: location.to_path_buf(),
                name: name.to_string(),
            };
            if self.position(&key).is_some() {
                continue;
            }
            let record = match CheckpointStore::for_mission(location, name).load() {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(checkpoint = %path.display(), "skipping unreadable checkpoint: {:#}", e);
                    continue;
                }
            };
            let mission = MissionBuilder::new(record.url, location, name)
                .config(&self.config)
                .restore()?;
            self.add_mission(mission.clone())?;
            self.watch(&mission);
            adopted += 1;
        }
        if adopted > 0 {
            tracing::info!(location = %location.display(), adopted, "adopted orphaned checkpoints");
        }
        Ok(adopted)
    }
}
