//! Algorithm registry: identifier → default-configured plugin instance.
//!
//! A registry is assembled once at start-up and then handed to an
//! [`Engine`](crate::record::Engine), which owns it.  There is no way to add
//! algorithms after that point, so lookups need no locking.

use std::collections::HashMap;

use crate::algorithm::argon::Argon2Hasher;
use crate::algorithm::{Algorithm, HashError};

#[derive(Debug, Default)]
pub struct Registry {
    algorithms: HashMap<String, Box<dyn Algorithm>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in algorithm in its default configuration.
    pub fn with_defaults() -> Self {
        Self::new().register(Box::new(Argon2Hasher::default()))
    }

    /// Like [`with_defaults`](Self::with_defaults) with an explicit Argon2 lane count.
    pub fn with_lanes(lanes: u32) -> Result<Self, HashError> {
        let argon = Argon2Hasher::default().with_lanes(lanes)?;
        Ok(Self::new().register(Box::new(argon)))
    }

    /// Add `algorithm` under its own identifier, replacing any previous entry.
    pub fn register(mut self, algorithm: Box<dyn Algorithm>) -> Self {
        self.algorithms.insert(algorithm.id().to_string(), algorithm);
        self
    }

    /// Resolve an identifier exactly as written in a record (case-sensitive).
    pub fn get(&self, id: &str) -> Result<&dyn Algorithm, HashError> {
        self.algorithms
            .get(id)
            .map(|a| &**a)
            .ok_or_else(|| HashError::UnknownAlgorithm(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.algorithms.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.algorithms.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize { self.algorithms.len() }

    pub fn is_empty(&self) -> bool { self.algorithms.is_empty() }
}
