//! Terrascape - procedural infinite terrain
//!
//! Layered noise height maps, LOD-aware chunk meshes and a streamer that
//! keeps chunks generated around a moving viewer on a background worker pool.

pub mod core;
pub mod math;
pub mod heightmap;
pub mod mesh;
pub mod generation;
pub mod streaming;
pub mod preview;
