//! Headless streaming run: flies a viewer over the terrain and reports
//! how the chunk streamer keeps up.
//!
//! Usage: cargo run --release --bin stream_terrain -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>    Terrain config JSON (default: built-in defaults)
//!   --seed <SEED>      Noise seed
//!   --ticks <N>        Frames to simulate (default: 600)
//!   --speed <UNITS>    World units moved per frame (default: 6.0)
//!   --radius <UNITS>   Fly in a circle of this radius instead of a line
//!   --threads <N>      Generation worker threads
//!   --in-flight <N>    Max concurrent generation jobs
//!   --frame-ms <MS>    Sleep per frame to mimic a frame budget (default: 0)
//!   --flat             Flat shading

use std::time::{Duration, Instant};

use glam::Vec3;

use terrascape::generation::TerrainConfig;
use terrascape::streaming::{ChunkStreamer, RecordingScene};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match TerrainConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => TerrainConfig::default(),
    };
    if let Some(seed) = parse_i32_arg(&args, "--seed") {
        config.height_map.noise.seed = seed;
    }
    if let Some(threads) = parse_usize_arg(&args, "--threads") {
        config.generation.worker_threads = threads;
    }
    if let Some(in_flight) = parse_usize_arg(&args, "--in-flight") {
        config.generation.max_in_flight = in_flight;
    }
    if args.iter().any(|a| a == "--flat") {
        config.mesh.use_flat_shading = true;
    }
    let config = config.validated();

    let ticks = parse_usize_arg(&args, "--ticks").unwrap_or(600);
    let speed = parse_f32_arg(&args, "--speed").unwrap_or(6.0);
    let radius = parse_f32_arg(&args, "--radius");
    let frame = Duration::from_millis(parse_usize_arg(&args, "--frame-ms").unwrap_or(0) as u64);

    println!("=== Terrascape Streaming Run ===");
    println!("Seed:     {}", config.height_map.noise.seed);
    println!("Chunks:   {} units, x{} scale, {} shading",
        config.mesh.mesh_world_size(), config.mesh.uniform_scale,
        if config.mesh.use_flat_shading { "flat" } else { "smooth" });
    println!("View:     {} units, {} LOD levels", config.lods.max_view_distance(), config.lods.len());
    println!("Workers:  {} threads, {} jobs in flight",
        config.generation.worker_threads, config.generation.max_in_flight);
    println!("Path:     {} frames at {} units/frame{}", ticks, speed,
        radius.map(|r| format!(", circle r={}", r)).unwrap_or_default());
    println!();

    let mut streamer = match ChunkStreamer::new(&config, RecordingScene::new()) {
        Ok(streamer) => streamer,
        Err(e) => {
            eprintln!("Failed to start streamer: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut slowest_tick = Duration::ZERO;
    let mut viewer = Vec3::ZERO;

    for i in 0..ticks {
        let travelled = i as f32 * speed;
        viewer = match radius {
            Some(r) if r > 0.0 => {
                let angle = travelled / r;
                Vec3::new(r * angle.cos(), 0.0, r * angle.sin())
            }
            _ => Vec3::new(travelled, 0.0, 0.0),
        };

        let tick_start = Instant::now();
        streamer.tick(viewer);
        slowest_tick = slowest_tick.max(tick_start.elapsed());

        if i % 60 == 0 {
            let stats = streamer.stats();
            eprintln!("  [{}/{}] viewer ({:.0}, {:.0}): {} chunks, {} visible, {} meshes received",
                i, ticks, viewer.x, viewer.z, streamer.chunk_count(),
                stats.visible_chunks, stats.meshes_received);
        }
        if !frame.is_zero() {
            std::thread::sleep(frame);
        }
    }

    // Let outstanding work land so the summary reflects the final window
    while !streamer.is_settled() {
        streamer.wait_for_generation(Duration::from_secs(60));
        streamer.tick(viewer);
    }
    let elapsed = start.elapsed();

    let stats = streamer.stats();
    println!();
    println!("=== Streaming Complete ===");
    println!("Frames:    {} in {:.1}s (slowest tick {:.2}ms)",
        stats.ticks, elapsed.as_secs_f64(), slowest_tick.as_secs_f64() * 1000.0);
    println!("Chunks:    {} created, {} visible, {} window updates",
        stats.chunks_created, stats.visible_chunks, stats.window_updates);
    println!("Requests:  {} height maps, {} meshes", stats.height_requests, stats.mesh_requests);
    println!("Delivered: {} height maps, {} meshes ({} kept for later LODs)",
        stats.height_maps_received, stats.meshes_received, stats.stale_meshes);
    println!("Colliders: {}", stats.colliders_assigned);
    println!("Failures:  {}", stats.failures);
    println!("Visible triangles: {}", streamer.scene().visible_triangles());
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_i32_arg(args: &[String], flag: &str) -> Option<i32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
