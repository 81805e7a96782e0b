use std::{collections::HashMap, fmt};

use shared::domain::{Position, Route, StopId};
use thiserror::Error;

use crate::sink::VisualHandle;

/// Registry slot of one vehicle: its route plus the stop it currently sits at.
///
/// The stop is part of the identity, so every move is a rekey.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub route: Route,
    pub stop: StopId,
}

impl EntityKey {
    pub fn new(route: Route, stop: StopId) -> Self {
        Self { route, stop }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.route, self.stop)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    pub key: EntityKey,
    pub position: Position,
    pub visual: VisualHandle,
}

/// The new entity was stored anyway; `displaced` is the one it replaced.
#[derive(Debug, Error)]
#[error("entity key {} was already tracked", .displaced.key)]
pub struct DuplicateKey {
    pub displaced: Box<TrackedEntity>,
}

#[derive(Debug, Error)]
#[error("no entity tracked under {0}")]
pub struct NotFound(pub EntityKey);

#[derive(Debug)]
pub struct Rekeyed {
    pub visual: VisualHandle,
    /// Entity that previously held the target key, if any.
    pub displaced: Option<TrackedEntity>,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityKey, TrackedEntity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new entity. On a key collision the new entity wins and the
    /// old one is handed back inside [`DuplicateKey`] so its
    /// visual can be released.
    pub fn create(
        &mut self,
        key: EntityKey,
        position: Position,
        visual: VisualHandle,
    ) -> Result<(), DuplicateKey> {
        let entity = TrackedEntity {
            key: key.clone(),
            position,
            visual,
        };
        match self.entities.insert(key, entity) {
            None => Ok(()),
            Some(displaced) => Err(DuplicateKey {
                displaced: Box::new(displaced),
            }),
        }
    }

    /// Moves the entity at `old` to `new`, keeping its visual. `position`
    /// replaces the stored position when known.
    pub fn rekey(
        &mut self,
        old: &EntityKey,
        new: EntityKey,
        position: Option<Position>,
    ) -> Result<Rekeyed, NotFound> {
        let mut entity = self
            .entities
            .remove(old)
            .ok_or_else(|| NotFound(old.clone()))?;
        entity.key = new.clone();
        if let Some(position) = position {
            entity.position = position;
        }
        let visual = entity.visual;
        let displaced = self.entities.insert(new, entity);
        Ok(Rekeyed { visual, displaced })
    }

    /// Removes the entity; the caller owns disposing its visual.
    pub fn retire(&mut self, key: &EntityKey) -> Result<TrackedEntity, NotFound> {
        self.entities
            .remove(key)
            .ok_or_else(|| NotFound(key.clone()))
    }

    pub fn get(&self, key: &EntityKey) -> Option<&TrackedEntity> {
        self.entities.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
