//! Lookup of configured tile matrix sets by id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{GridMatrixSet, SharedGridMatrixSet};

/// Registry of tile matrix sets, keyed by id.
///
/// Lookups are case-sensitive. The registry is populated at configuration
/// time; sets themselves are immutable once registered.
#[derive(Debug)]
pub struct GridSetRegistry {
    sets: RwLock<HashMap<String, SharedGridMatrixSet>>,
}

impl GridSetRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding `WebMercatorQuad` and `WorldCRS84Quad`.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(GridMatrixSet::web_mercator_quad());
        registry.register(GridMatrixSet::world_crs84_quad());
        registry
    }

    /// Register a set, replacing any previous set with the same id.
    pub fn register(&self, set: GridMatrixSet) -> SharedGridMatrixSet {
        let set = Arc::new(set);
        info!(
            tile_matrix_set = set.id(),
            crs = %set.crs(),
            levels = set.levels().len(),
            "Registered tile matrix set"
        );
        self.sets
            .write()
            .insert(set.id().to_string(), Arc::clone(&set));
        set
    }

    pub fn get(&self, id: &str) -> Option<SharedGridMatrixSet> {
        self.sets.read().get(id).cloned()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sets.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for GridSetRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Crs;
    use crate::grid::GridLevel;

    #[test]
    fn test_builtins_registered() {
        let registry = GridSetRegistry::with_builtins();
        assert_eq!(registry.ids(), vec!["WebMercatorQuad", "WorldCRS84Quad"]);
        assert!(registry.get("WebMercatorQuad").is_some());
        assert!(registry.get("webmercatorquad").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let registry = GridSetRegistry::empty();
        let custom = GridMatrixSet::new(
            "Custom",
            Crs::epsg(2056),
            (2_420_000.0, 1_350_000.0),
            vec![GridLevel::new(0, 4000.0 / 0.00028, 256, 256, 1, 1)],
        )
        .unwrap();
        registry.register(custom.clone());
        registry.register(custom);
        assert_eq!(registry.ids(), vec!["Custom"]);
        assert_eq!(registry.get("Custom").unwrap().crs(), Crs::epsg(2056));
    }
}
