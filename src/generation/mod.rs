//! Background generation of height maps and meshes
//!
//! `config` holds the settings cells and JSON config; `service` runs the
//! worker pool and the per-tick result queues.

pub mod config;
pub mod service;

pub use config::{GenerationConfig, SharedSettings, TerrainConfig, Validate};
pub use service::{DrainStats, GenerationResult, GenerationService, ServiceStats};
