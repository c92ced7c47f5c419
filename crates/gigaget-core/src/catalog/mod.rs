//! Mission catalog: the durable list of missions the manager knows about.
//!
//! Missions are keyed by `(location, name)`, the same identity their
//! checkpoint is named after. `update` and `delete` of a mission that was
//! never added are contract violations and fail with [`CatalogError::NotAdded`].

mod json;

pub use json::{CatalogEntry, JsonCatalog};

use std::fmt;
use std::path::PathBuf;

use crate::manager::ManagedMission;

/// Identity of a mission inside a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MissionKey {
    pub location: PathBuf,
    pub name: String,
}

impl fmt::Display for MissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location.join(&self.name).display())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("mission {0} was never added to the catalog")]
    NotAdded(MissionKey),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub trait MissionCatalog<M> {
    /// Every stored mission, in storage order.
    fn load(&mut self) -> Result<Vec<M>, CatalogError>;
    fn add(&mut self, mission: &M) -> Result<(), CatalogError>;
    fn update(&mut self, mission: &M) -> Result<(), CatalogError>;
    fn delete(&mut self, mission: &M) -> Result<(), CatalogError>;
}

/// In-process catalog; keeps handles to the missions themselves.
#[derive(Debug)]
pub struct MemoryCatalog<M> {
    missions: Vec<M>,
}

impl<M> Default for MemoryCatalog<M> {
    fn default() -> Self {
        Self { missions: Vec::new() }
    }
}

impl<M: ManagedMission + Clone> MemoryCatalog<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with `missions`, as if each had been added.
    pub fn with_missions(missions: Vec<M>) -> Self {
        Self { missions }
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn contains(&self, key: &MissionKey) -> bool {
        self.position(key).is_some()
    }

    fn position(&self, key: &MissionKey) -> Option<usize> {
        self.missions.iter().position(|m| &m.key() == key)
    }
}

impl<M: ManagedMission + Clone> MissionCatalog<M> for MemoryCatalog<M> {
    fn load(&mut self) -> Result<Vec<M>, CatalogError> {
        Ok(self.missions.clone())
    }

    fn add(&mut self, mission: &M) -> Result<(), CatalogError> {
        match self.position(&mission.key()) {
            Some(i) => self.missions[i] = mission.clone(),
            None => self.missions.push(mission.clone()),
        }
        Ok(())
    }

    fn update(&mut self, mission: &M) -> Result<(), CatalogError> {
        let key = mission.key();
        let i = self.position(&key).ok_or(CatalogError::NotAdded(key))?;
        self.missions[i] = mission.clone();
        Ok(())
    }

    fn delete(&mut self, mission: &M) -> Result<(), CatalogError> {
        let key = mission.key();
        let i = self.position(&key).ok_or(CatalogError::NotAdded(key))?;
        self.missions.remove(i);
        Ok(())
    }
}
