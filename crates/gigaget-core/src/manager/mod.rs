//! Mission manager: an ordered, index-addressed collection of missions kept
//! in sync with a [`MissionCatalog`].
//!
//! Missions are ordered by ascending creation timestamp. The manager is
//! generic over [`ManagedMission`] so the index operations can be driven
//! with something other than a real network mission.

mod downloads;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::{CatalogError, MissionCatalog, MissionKey};
use crate::config::GigagetConfig;
use crate::listener::DeliveryContext;
use crate::mission::{Mission, MissionError};

/// What the manager needs from a mission.
pub trait ManagedMission {
    fn key(&self) -> MissionKey;
    fn timestamp(&self) -> u64;
    fn is_running(&self) -> bool;
    fn start(&self);
    fn pause(&self);
    fn delete(&self) -> anyhow::Result<()>;
}

impl ManagedMission for Mission {
    fn key(&self) -> MissionKey {
        MissionKey {
            location: self.location().to_path_buf(),
            name: self.name().to_string(),
        }
    }

    fn timestamp(&self) -> u64 {
        Mission::timestamp(self)
    }

    fn is_running(&self) -> bool {
        Mission::is_running(self)
    }

    fn start(&self) {
        Mission::start(self)
    }

    fn pause(&self) {
        Mission::pause(self)
    }

    fn delete(&self) -> anyhow::Result<()> {
        Mission::delete(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("no mission at index {index} ({count} missions)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Mission(#[from] MissionError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Stable sort by ascending timestamp (full 64-bit comparison).
pub fn sort_by_timestamp<M: ManagedMission>(missions: &mut [M]) {
    missions.sort_by_key(|m| m.timestamp());
}

pub struct MissionManager<M, C> {
    missions: Vec<M>,
    catalog: Arc<Mutex<C>>,
    config: GigagetConfig,
    /// Context for catalog-sync callbacks; set by [`MissionManager::open`].
    events: Option<Arc<dyn DeliveryContext>>,
}

impl<M: ManagedMission, C: MissionCatalog<M>> MissionManager<M, C> {
    /// Load every mission from `catalog`, ordered by timestamp.
    pub fn new(mut catalog: C) -> Result<Self, ManagerError> {
        let mut missions = catalog.load()?;
        sort_by_timestamp(&mut missions);
        tracing::debug!(count = missions.len(), "missions loaded from catalog");
        Ok(Self {
            missions,
            catalog: Arc::new(Mutex::new(catalog)),
            config: GigagetConfig::default(),
            events: None,
        })
    }

    /// Settings for missions created by this manager.
    pub fn with_config(mut self, config: GigagetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GigagetConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.missions.len()
    }

    pub fn missions(&self) -> &[M] {
        &self.missions
    }

    pub fn catalog(&self) -> MutexGuard<'_, C> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_mission(&self, index: usize) -> Result<&M, ManagerError> {
        self.missions.get(index).ok_or(ManagerError::IndexOutOfRange {
            index,
            count: self.missions.len(),
        })
    }

    pub fn position(&self, key: &MissionKey) -> Option<usize> {
        self.missions.iter().position(|m| &m.key() == key)
    }

    /// Start the mission at `index` unless it is already running.
    pub fn resume_mission(&self, index: usize) -> Result<(), ManagerError> {
        let mission = self.get_mission(index)?;
        if !mission.is_running() {
            mission.start();
        }
        Ok(())
    }

    /// Pause the mission at `index` if it is running.
    pub fn pause_mission(&self, index: usize) -> Result<(), ManagerError> {
        let mission = self.get_mission(index)?;
        if mission.is_running() {
            mission.pause();
        }
        Ok(())
    }

    /// Delete the mission's files and drop it from the manager and catalog.
    /// The mission is removed from memory even when a later step fails.
    pub fn delete_mission(&mut self, index: usize) -> Result<(), ManagerError> {
        self.get_mission(index)?;
        let mission = self.missions.remove(index);
        let deleted = mission.delete();
        self.catalog().delete(&mission)?;
        deleted?;
        tracing::info!(mission = %mission.key(), "mission removed");
        Ok(())
    }

    /// Register `mission` with the catalog; returns its index.
    pub fn add_mission(&mut self, mission: M) -> Result<usize, ManagerError> {
        self.catalog().add(&mission)?;
        let key = mission.key();
        self.missions.push(mission);
        sort_by_timestamp(&mut self.missions);
        Ok(self.position(&key).unwrap_or(self.missions.len() - 1))
    }
}
