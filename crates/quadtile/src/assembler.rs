//! Per-frame tile selection.
//!
//! The assembler walks the quad-tree from the level-zero tiles down, keeps a
//! tile when it is detailed enough for the current view and otherwise splits
//! it into its four children. A kept tile without a resident texture is
//! requested in the background and drawn with the nearest resident
//! ancestor's texture until its own arrives.

use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{TileCache, entry_count};
use crate::error::{Error, Result};
use crate::fetch::{FetchRequest, TileFetcher};
use crate::level::{LevelSet, TileKey};
use crate::queue::RequestQueue;
use crate::tile::{TexCoordTransform, Texture, TextureTile};
use crate::view::ViewState;

/// Tuning for tile selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Larger values accept coarser tiles at a given distance.
    pub split_scale: f64,
    /// Divides a tile's angular height when converting it to a ground cell size.
    pub cell_size_divisor: f64,
    /// Read a missing level-zero tile from the persistent store before
    /// drawing. Source retrieval always goes through the request queue.
    pub force_level_zero_loads: bool,
    /// Fetch requests kept per frame.
    pub queue_capacity: usize,
    /// Parents whose child tiles are kept between frames.
    pub child_cache_capacity: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            split_scale: 0.9,
            cell_size_divisor: 20.0,
            force_level_zero_loads: true,
            queue_capacity: 200,
            child_cache_capacity: 5000,
        }
    }
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.split_scale.is_finite() {
            return Err(Error::invalid_config(
                "assembler",
                format!("split scale must be finite, got {}", self.split_scale),
            ));
        }
        if !(self.cell_size_divisor.is_finite() && self.cell_size_divisor > 0.0) {
            return Err(Error::invalid_config(
                "assembler",
                format!(
                    "cell size divisor must be positive, got {}",
                    self.cell_size_divisor
                ),
            ));
        }
        Ok(())
    }
}

/// One tile of a frame's output.
#[derive(Debug, Clone)]
pub struct AssembledTile {
    pub tile: Arc<TextureTile>,
    /// The texture to draw: the tile's own, or its fallback's.
    pub texture: Texture,
    /// The ancestor whose texture stands in for the tile's own.
    pub fallback: Option<TileKey>,
    /// Where the tile lies within `texture`.
    pub tex_coords: TexCoordTransform,
}

impl AssembledTile {
    fn own(tile: &Arc<TextureTile>, texture: Texture) -> Self {
        Self {
            tile: Arc::clone(tile),
            texture,
            fallback: None,
            tex_coords: TexCoordTransform::IDENTITY,
        }
    }

    fn with_fallback(tile: &Arc<TextureTile>, ancestor: &Ancestor) -> Self {
        Self {
            tile: Arc::clone(tile),
            texture: ancestor.texture.clone(),
            fallback: Some(ancestor.tile.key().clone()),
            tex_coords: TexCoordTransform::for_fallback(&tile.sector(), &ancestor.tile.sector()),
        }
    }

    /// Level of the texture actually drawn.
    #[must_use]
    pub fn effective_level(&self) -> u32 {
        self.fallback
            .as_ref()
            .map_or_else(|| self.tile.level_number(), |key| key.level)
    }

    #[must_use]
    pub fn uses_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// The nearest resident ancestor during descent.
#[derive(Clone)]
struct Ancestor {
    tile: Arc<TextureTile>,
    texture: Texture,
}

/// Selects the tiles to draw each frame and requests the missing ones.
pub struct TileAssembler {
    levels: Arc<LevelSet>,
    fetcher: Arc<TileFetcher>,
    config: AssemblerConfig,
    top_level: Vec<Arc<TextureTile>>,
    children: TileCache<Arc<[Arc<TextureTile>; 4]>>,
    queue: RequestQueue<FetchRequest>,
}

impl TileAssembler {
    pub fn new(fetcher: Arc<TileFetcher>, config: AssemblerConfig) -> Result<Self> {
        config.validate()?;
        let levels = Arc::clone(fetcher.levels());
        let top_level = levels.create_top_level_tiles();
        let children = TileCache::new("child tiles", entry_count(config.child_cache_capacity))?;
        Ok(Self {
            levels,
            fetcher,
            queue: RequestQueue::new(config.queue_capacity),
            config,
            top_level,
            children,
        })
    }

    #[must_use]
    pub fn levels(&self) -> &Arc<LevelSet> {
        &self.levels
    }

    #[must_use]
    pub fn fetcher(&self) -> &Arc<TileFetcher> {
        &self.fetcher
    }

    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Tiles to draw for `view`, coarsest effective level first.
    ///
    /// Missing textures are requested from the fetcher before returning.
    pub fn assemble(&mut self, view: &ViewState) -> Vec<AssembledTile> {
        let mut output = Vec::new();
        let roots = self.top_level.clone();
        for tile in &roots {
            self.add_tile_or_descendants(tile, view, None, &mut output);
        }

        output.sort_by_key(AssembledTile::effective_level);

        let queued = self.queue.len();
        let submitted = self.queue.drain(&self.fetcher);
        tracing::trace!(tiles = output.len(), queued, submitted, "assembled frame");
        output
    }

    fn add_tile_or_descendants(
        &mut self,
        tile: &Arc<TextureTile>,
        view: &ViewState,
        ancestor: Option<&Ancestor>,
        output: &mut Vec<AssembledTile>,
    ) {
        if !Self::is_tile_visible(tile, view) {
            return;
        }

        if self.meets_render_criteria(tile, view) {
            self.add_tile(tile, ancestor, output);
            return;
        }

        let resident = self
            .resident_texture(tile)
            .or_else(|| self.force_level_zero(tile));
        let next_ancestor = resident.map(|texture| Ancestor {
            tile: Arc::clone(tile),
            texture,
        });
        let ancestor = next_ancestor.as_ref().or(ancestor);

        let Some(children) = self.sub_tiles(tile) else {
            return;
        };
        for child in children.iter() {
            self.add_tile_or_descendants(child, view, ancestor, output);
        }
    }

    fn add_tile(
        &mut self,
        tile: &Arc<TextureTile>,
        ancestor: Option<&Ancestor>,
        output: &mut Vec<AssembledTile>,
    ) {
        if let Some(texture) = self.resident_texture(tile) {
            if tile.is_texture_expired(&texture) {
                self.request(tile);
            }
            output.push(AssembledTile::own(tile, texture));
            return;
        }

        if let Some(texture) = self.force_level_zero(tile) {
            output.push(AssembledTile::own(tile, texture));
            return;
        }

        self.request(tile);
        if let Some(ancestor) = ancestor {
            output.push(AssembledTile::with_fallback(tile, ancestor));
        }
    }

    fn resident_texture(&self, tile: &TextureTile) -> Option<Texture> {
        self.fetcher.textures().get(tile.key())
    }

    /// Synchronously read a missing level-zero tile from the persistent
    /// store, if configured to. Never waits on the source.
    fn force_level_zero(&self, tile: &TextureTile) -> Option<Texture> {
        let eligible = self.config.force_level_zero_loads
            && tile.level_number() == 0
            && !self.levels.is_level_empty(0)
            && !self.levels.is_resource_absent(tile.key())
            && !self.fetcher.is_in_flight(tile.key());
        if !eligible {
            return None;
        }
        tracing::trace!(key = %tile.key(), "forcing level zero load from store");
        self.fetcher.load_local_blocking(tile)
    }

    fn request(&mut self, tile: &Arc<TextureTile>) {
        if self.levels.is_level_empty(tile.level_number())
            || self.levels.is_resource_absent(tile.key())
            || self.fetcher.is_in_flight(tile.key())
        {
            return;
        }
        self.queue.submit(FetchRequest::new(Arc::clone(tile)));
    }

    fn sub_tiles(&self, tile: &TextureTile) -> Option<Arc<[Arc<TextureTile>; 4]>> {
        let next = self.levels.level(tile.level_number() + 1)?;
        if let Some(children) = self.children.get(tile.key()) {
            return Some(children);
        }
        let children = Arc::new(tile.create_sub_tiles(next));
        self.children
            .put(tile.key().clone(), Arc::clone(&children), 1);
        Some(children)
    }

    fn is_tile_visible(tile: &TextureTile, view: &ViewState) -> bool {
        view.is_sector_visible(&tile.sector()) && tile.extent(&view.globe).intersects(&view.frustum)
    }

    fn meets_render_criteria(&self, tile: &TextureTile, view: &ViewState) -> bool {
        let level = tile.level_number();
        self.levels.is_final_level(level)
            || (!self.levels.is_level_empty(level) && !self.needs_to_split(tile, view))
    }

    /// Whether the tile's ground cell is too coarse for its distance from
    /// the eye. Compared as logarithms so one rule holds from orbit to the
    /// ground.
    #[must_use]
    pub fn needs_to_split(&self, tile: &TextureTile, view: &ViewState) -> bool {
        let sector = tile.sector();
        let cell_size =
            PI * sector.delta_lat().radians() * view.globe.radius / self.config.cell_size_divisor;
        let min_distance = view.min_distance(&sector);
        cell_size.log10() > min_distance.log10() - self.config.split_scale
    }
}

impl std::fmt::Debug for TileAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileAssembler")
            .field("config", &self.config)
            .field("top_level", &self.top_level.len())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
