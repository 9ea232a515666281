//! Map preview binary: renders one chunk-sized map to PNG.
//!
//! Usage: cargo run --release --bin generate_map -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>       Terrain config JSON (default: built-in defaults)
//!   --seed <SEED>         Noise seed
//!   --scale <SCALE>       Noise scale
//!   --octaves <N>         Noise octaves
//!   --mode <MODE>         noise | colour | mesh | falloff (default: noise)
//!   --lod <LOD>           Mesher LOD for mesh mode (default: 0)
//!   --centre <X,Y>        Noise-space centre (default: 0,0)
//!   --falloff             Subtract the falloff mask
//!   --local               Use local normalization
//!   --flat                Flat shading
//!   --out <PATH>          Output PNG (default: terrain_preview.png)
//!   --save-config <PATH>  Write the effective config as JSON

use std::time::Instant;

use glam::Vec2;

use terrascape::generation::{SharedSettings, TerrainConfig};
use terrascape::heightmap::NormalizeMode;
use terrascape::preview::{DrawMode, MapPreview, Preview};

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

    let noise = &mut config.height_map.noise;
    if let Some(seed) = parse_i32_arg(&args, "--seed") {
        noise.seed = seed;
    }
    if let Some(scale) = parse_f32_arg(&args, "--scale") {
        noise.scale = scale;
    }
    if let Some(octaves) = parse_i32_arg(&args, "--octaves") {
        noise.octaves = octaves;
    }
    if has_flag(&args, "--local") {
        noise.normalize_mode = NormalizeMode::Local;
    }
    if has_flag(&args, "--falloff") {
        config.height_map.use_falloff = true;
    }
    if has_flag(&args, "--flat") {
        config.mesh.use_flat_shading = true;
    }
    let config = config.validated();

    let mode = match parse_str_arg(&args, "--mode").map(|m| m.parse::<DrawMode>()) {
        Some(Ok(mode)) => mode,
        Some(Err(e)) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        None => DrawMode::NoiseMap,
    };
    let lod = parse_usize_arg(&args, "--lod").unwrap_or(0);
    let centre = parse_vec2_arg(&args, "--centre").unwrap_or(Vec2::ZERO);
    let out = parse_str_arg(&args, "--out").unwrap_or_else(|| "terrain_preview.png".to_string());

    if let Some(path) = parse_str_arg(&args, "--save-config") {
        if let Err(e) = config.save(&path) {
            eprintln!("Failed to write {}: {}", path, e);
            std::process::exit(1);
        }
        println!("Config written to {}", path);
    }

    let noise = &config.height_map.noise;
    println!("=== Terrascape Map Preview ===");
    println!("Seed:    {}", noise.seed);
    println!("Noise:   scale {}, {} octaves, persistence {}, lacunarity {}",
        noise.scale, noise.octaves, noise.persistence, noise.lacunarity);
    println!("Mode:    {:?} ({:?} normalization)", mode, noise.normalize_mode);
    println!("Size:    {}x{} samples", config.mesh.bordered_size(), config.mesh.bordered_size());
    println!("Centre:  ({}, {})", centre.x, centre.y);
    println!();

    let mut preview = MapPreview::new(
        SharedSettings::new(config.height_map.clone()),
        SharedSettings::new(config.mesh.clone()),
        config.regions.clone(),
    );
    preview.draw_mode = mode;
    preview.lod = lod;
    preview.centre = centre;

    let start = Instant::now();
    let result = preview.regenerate().clone();
    let elapsed = start.elapsed();

    if let Some(height_map) = preview.height_map() {
        println!("Heights: {:.3} .. {:.3}", height_map.min_value, height_map.max_value);
    }
    if let Preview::Mesh { mesh, .. } = &result {
        let (lo, hi) = mesh.height_range();
        println!("Mesh:    LOD {}, {} vertices, {} triangles, {}",
            mesh.lod, mesh.vertex_count(), mesh.triangle_count(),
            if mesh.is_flat_shaded() { "flat shaded" } else { "smooth" });
        println!("Relief:  {:.2} .. {:.2} (x{} world scale)", lo, hi, config.mesh.uniform_scale);
    }
    println!("Generated in {:.1}ms", elapsed.as_secs_f64() * 1000.0);

    if let Err(e) = result.save(&out) {
        eprintln!("Failed to write {}: {}", out, e);
        std::process::exit(1);
    }
    println!("Output:  {}", out);
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
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

fn parse_vec2_arg(args: &[String], flag: &str) -> Option<Vec2> {
    let value = parse_str_arg(args, flag)?;
    let (x, y) = value.split_once(',')?;
    Some(Vec2::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}
