//! Single-map preview for tuning settings
//!
//! Generates one chunk-sized height map at a fixed centre and renders it as
//! an image or mesh. Dependents poll the settings version counters; a moved
//! version (or a changed draw mode) triggers regeneration on the next
//! [`MapPreview::update`].

use std::path::Path;
use std::sync::Arc;

use glam::Vec2;
use image::{DynamicImage, RgbaImage};

use crate::core::Result;
use crate::generation::config::SharedSettings;
use crate::heightmap::{
    FalloffCache, HeightMap, HeightMapSettings, RegionTable, colour_map_image, generate_height_map,
    height_map_image, save_png,
};
use crate::mesh::{MeshPayload, MeshSettings, NUM_SUPPORTED_LODS, generate_terrain_mesh};

/// What the preview shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawMode {
    /// Greyscale heights
    #[default]
    NoiseMap,
    /// Heights coloured by terrain region
    ColourMap,
    /// Triangulated chunk with a region texture
    Mesh,
    /// The falloff mask alone
    FalloffMap,
}

impl std::str::FromStr for DrawMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noise" | "noisemap" => Ok(Self::NoiseMap),
            "colour" | "color" | "colourmap" => Ok(Self::ColourMap),
            "mesh" => Ok(Self::Mesh),
            "falloff" | "falloffmap" => Ok(Self::FalloffMap),
            other => Err(format!("unknown draw mode '{}'", other)),
        }
    }
}

/// Rendered preview
#[derive(Clone, Debug)]
pub enum Preview {
    Texture(DynamicImage),
    Mesh { mesh: MeshPayload, texture: RgbaImage },
}

impl Preview {
    /// Write the preview's image (the texture, for meshes) as PNG.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        match self {
            Preview::Texture(image) => save_png(image.clone(), path),
            Preview::Mesh { texture, .. } => save_png(texture.clone(), path),
        }
    }
}

pub struct MapPreview {
    pub draw_mode: DrawMode,
    /// Mesher LOD used in [`DrawMode::Mesh`]
    pub lod: usize,
    /// Noise-space centre of the previewed map
    pub centre: Vec2,
    pub regions: RegionTable,
    height_settings: SharedSettings<HeightMapSettings>,
    mesh_settings: SharedSettings<MeshSettings>,
    falloff: FalloffCache,
    generated_for: Option<(u64, u64, DrawMode, usize, Vec2)>,
    height_map: Option<Arc<HeightMap>>,
    current: Option<Preview>,
}

impl MapPreview {
    pub fn new(
        height_settings: SharedSettings<HeightMapSettings>,
        mesh_settings: SharedSettings<MeshSettings>,
        regions: RegionTable,
    ) -> Self {
        Self {
            draw_mode: DrawMode::default(),
            lod: 0,
            centre: Vec2::ZERO,
            regions,
            height_settings,
            mesh_settings,
            falloff: FalloffCache::new(),
            generated_for: None,
            height_map: None,
            current: None,
        }
    }

    fn inputs(&self) -> (u64, u64, DrawMode, usize, Vec2) {
        (
            self.height_settings.version(),
            self.mesh_settings.version(),
            self.draw_mode,
            self.lod,
            self.centre,
        )
    }

    /// True when settings or preview options changed since the last render.
    pub fn is_stale(&self) -> bool {
        self.generated_for != Some(self.inputs())
    }

    /// Regenerate if stale. Returns whether a new preview was produced.
    pub fn update(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        self.regenerate();
        true
    }

    /// Render unconditionally.
    pub fn regenerate(&mut self) -> &Preview {
        let inputs = self.inputs();
        let (height, _) = self.height_settings.snapshot();
        let mesh_settings = self.mesh_settings.get();
        let size = mesh_settings.bordered_size();

        let height_map = Arc::new(generate_height_map(size, size, &height, self.centre, Some(&self.falloff)));
        let field = &height_map.values;

        let preview = match self.draw_mode {
            DrawMode::NoiseMap => Preview::Texture(DynamicImage::ImageLuma8(height_map_image(field))),
            DrawMode::ColourMap => Preview::Texture(DynamicImage::ImageRgba8(colour_map_image(
                &self.regions.colour_map(field),
                size,
                size,
            ))),
            DrawMode::Mesh => {
                let lod = self.lod.min(NUM_SUPPORTED_LODS - 1);
                let mesh = generate_terrain_mesh(
                    field,
                    height.height_multiplier,
                    &height.height_curve,
                    lod,
                    mesh_settings.use_flat_shading,
                );
                let texture = colour_map_image(&self.regions.colour_map(field), size, size);
                Preview::Mesh { mesh, texture }
            }
            DrawMode::FalloffMap => {
                Preview::Texture(DynamicImage::ImageLuma8(height_map_image(&self.falloff.get(size, size))))
            }
        };

        log::debug!("Preview regenerated: {:?} at {}x{}", self.draw_mode, size, size);
        self.generated_for = Some(inputs);
        self.height_map = Some(height_map);
        self.current.insert(preview)
    }

    pub fn current(&self) -> Option<&Preview> {
        self.current.as_ref()
    }

    /// Height map behind the current preview
    pub fn height_map(&self) -> Option<&Arc<HeightMap>> {
        self.height_map.as_ref()
    }
}
