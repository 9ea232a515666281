//! Generation and streaming configuration.
//!
//! Settings are plain data with `validate()` clamping. Values shared with
//! background workers live in a [`SharedSettings`] cell: readers take an
//! `Arc` snapshot and dependents poll its version counter to learn about
//! edits.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::heightmap::{HeightMapSettings, NoiseSettings, RegionTable};
use crate::mesh::MeshSettings;
use crate::streaming::lod::LodTable;

/// Clamp-in-place validation for settings types.
pub trait Validate {
    fn validate(&mut self);
}

impl Validate for NoiseSettings {
    fn validate(&mut self) {
        NoiseSettings::validate(self)
    }
}

impl Validate for HeightMapSettings {
    fn validate(&mut self) {
        HeightMapSettings::validate(self)
    }
}

impl Validate for MeshSettings {
    fn validate(&mut self) {
        MeshSettings::validate(self)
    }
}

struct Versioned<T> {
    value: Arc<T>,
    version: u64,
}

/// Versioned settings cell shared between the main thread and workers.
///
/// Every successful edit bumps the version. Readers never block writers for
/// longer than an `Arc` clone.
pub struct SharedSettings<T> {
    inner: Arc<RwLock<Versioned<T>>>,
}

impl<T> Clone for SharedSettings<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Validate + Clone> SharedSettings<T> {
    /// Wrap validated settings at version 0.
    pub fn new(mut value: T) -> Self {
        value.validate();
        Self {
            inner: Arc::new(RwLock::new(Versioned {
                value: Arc::new(value),
                version: 0,
            })),
        }
    }

    /// Current settings.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.inner.read().unwrap_or_else(|e| e.into_inner()).value)
    }

    /// Number of edits so far.
    pub fn version(&self) -> u64 {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).version
    }

    /// Current settings together with their version.
    pub fn snapshot(&self) -> (Arc<T>, u64) {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        (Arc::clone(&guard.value), guard.version)
    }

    /// Replace the settings; returns the new version.
    pub fn replace(&self, mut value: T) -> u64 {
        value.validate();
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.value = Arc::new(value);
        guard.version += 1;
        guard.version
    }

    /// Edit a copy of the settings and publish it; returns the new version.
    pub fn update(&self, edit: impl FnOnce(&mut T)) -> u64 {
        let mut value = (*self.get()).clone();
        edit(&mut value);
        self.replace(value)
    }
}

/// Worker pool sizing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Threads in the generation pool.
    pub worker_threads: usize,
    /// Jobs allowed to run at once; further requests wait in FIFO order.
    ///
    /// This caps running work only. The waiting queue is unbounded.
    pub max_in_flight: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(2);
        Self {
            worker_threads: threads,
            max_in_flight: 64,
        }
    }
}

impl Validate for GenerationConfig {
    fn validate(&mut self) {
        self.worker_threads = self.worker_threads.max(1);
        self.max_in_flight = self.max_in_flight.max(1);
    }
}

/// Complete terrain configuration, loadable from JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub height_map: HeightMapSettings,
    pub mesh: MeshSettings,
    pub lods: LodTable,
    /// Index into `lods` whose mesh becomes the collision mesh.
    pub collider_lod_index: usize,
    pub generation: GenerationConfig,
    pub regions: RegionTable,
}

impl Validate for TerrainConfig {
    fn validate(&mut self) {
        self.height_map.validate();
        self.mesh.validate();
        self.generation.validate();
        self.collider_lod_index = self.collider_lod_index.min(self.lods.len().saturating_sub(1));
    }
}

impl TerrainConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let mut config: TerrainConfig = serde_json::from_str(&json)?;
        config.validate();
        log::info!("Loaded terrain config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Validated copy.
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::lod::LodInfo;

    #[test]
    fn test_shared_settings_versioning() {
        let settings = SharedSettings::new(HeightMapSettings::default());
        assert_eq!(settings.version(), 0);

        let v = settings.update(|s| s.height_multiplier = 50.0);
        assert_eq!(v, 1);
        assert_eq!(settings.get().height_multiplier, 50.0);

        let (snapshot, version) = settings.snapshot();
        settings.update(|s| s.height_multiplier = 10.0);
        // Old snapshots are unaffected by later edits
        assert_eq!(snapshot.height_multiplier, 50.0);
        assert_eq!(version, 1);
        assert_eq!(settings.version(), 2);
    }

    #[test]
    fn test_shared_settings_validates_edits() {
        let settings = SharedSettings::new(NoiseSettings::default());
        settings.update(|s| {
            s.scale = -1.0;
            s.lacunarity = 0.2;
        });
        let noise = settings.get();
        assert!(noise.scale > 0.0);
        assert_eq!(noise.lacunarity, 1.0);
    }

    #[test]
    fn test_clones_share_state() {
        let a = SharedSettings::new(MeshSettings::default());
        let b = a.clone();
        a.update(|s| s.use_flat_shading = true);
        assert!(b.get().use_flat_shading);
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn test_config_validate() {
        let mut config = TerrainConfig {
            lods: LodTable::new(vec![LodInfo::new(0, 100.0), LodInfo::new(1, 200.0)]),
            collider_lod_index: 5,
            generation: GenerationConfig { worker_threads: 0, max_in_flight: 0 },
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.collider_lod_index, 1);
        assert_eq!(config.generation.worker_threads, 1);
        assert_eq!(config.generation.max_in_flight, 1);
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.json");

        let mut config = TerrainConfig::default();
        config.height_map.noise.seed = 42;
        config.mesh.use_flat_shading = true;
        config.save(&path).unwrap();

        let loaded = TerrainConfig::load(&path).unwrap();
        assert_eq!(loaded, config.validated());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "height_map": { "noise": { "seed": 7, "octaves": -3 } } }"#).unwrap();

        let config = TerrainConfig::load(&path).unwrap();
        assert_eq!(config.height_map.noise.seed, 7);
        assert_eq!(config.height_map.noise.octaves, 0);
        assert_eq!(config.lods, LodTable::default());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = TerrainConfig::load("/nonexistent/terrain.json").unwrap_err();
        assert!(matches!(err, crate::core::Error::Io(_)));
    }
}
