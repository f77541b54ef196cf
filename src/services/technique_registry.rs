//! Technique Registry
//!
//! Maps technique identifiers to their capability records. The catalog
//! populates it at startup; commands only look techniques up by id.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::models::AttackTechnique;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown attack technique: {0}")]
    UnknownTechnique(String),

    #[error("attack technique {0} is already registered")]
    DuplicateTechnique(String),
}

/// Registry of attack techniques, ordered by identifier.
#[derive(Debug, Default, Clone)]
pub struct TechniqueRegistry {
    techniques: BTreeMap<String, Arc<AttackTechnique>>,
}

impl TechniqueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, technique: AttackTechnique) -> Result<(), RegistryError> {
        if self.techniques.contains_key(&technique.id) {
            return Err(RegistryError::DuplicateTechnique(technique.id));
        }
        self.techniques
            .insert(technique.id.clone(), Arc::new(technique));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<AttackTechnique>> {
        self.techniques.get(id).cloned()
    }

    /// Resolve identifiers in the given order; the first unknown id fails.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Arc<AttackTechnique>>, RegistryError> {
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                self.get(id)
                    .ok_or_else(|| RegistryError::UnknownTechnique(id.to_string()))
            })
            .collect()
    }

    pub fn list(&self) -> Vec<Arc<AttackTechnique>> {
        self.techniques.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }
}
