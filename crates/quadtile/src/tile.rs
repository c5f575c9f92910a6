//! Tiles: geographic cells at one level, and the texture-carrying tiles the
//! assembler walks.

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use glam::{DVec3, Vec2};
use quadtile_decode::DecodedTexture;
use web_time::SystemTime;

use crate::cache::TileCache;
use crate::geo::{LatLon, Sector};
use crate::level::{Level, TileKey};
use crate::view::Frustum;

/// A decoded tile texture, shared between the cache and the frame's tile list.
///
/// Carries the time it was installed, so expiry survives the tile objects
/// being rebuilt.
#[derive(Debug, Clone)]
pub struct Texture {
    data: Arc<DecodedTexture>,
    updated: SystemTime,
}

impl Texture {
    /// Wrap freshly installed data, stamped with the current time.
    #[must_use]
    pub fn new(data: DecodedTexture) -> Self {
        Self::with_update_time(data, SystemTime::now())
    }

    #[must_use]
    pub fn with_update_time(data: DecodedTexture, updated: SystemTime) -> Self {
        Self {
            data: Arc::new(data),
            updated,
        }
    }

    /// When this texture arrived.
    #[must_use]
    pub fn update_time(&self) -> SystemTime {
        self.updated
    }

    #[must_use]
    pub fn data(&self) -> &Arc<DecodedTexture> {
        &self.data
    }

    /// Whether both handles share the same pixel data.
    #[must_use]
    pub fn ptr_eq(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Deref for Texture {
    type Target = DecodedTexture;

    fn deref(&self) -> &DecodedTexture {
        &self.data
    }
}

/// A rectangular geographic cell at one level.
#[derive(Debug, Clone)]
pub struct Tile {
    sector: Sector,
    level: Arc<Level>,
    row: i32,
    column: i32,
    key: TileKey,
}

impl Tile {
    #[must_use]
    pub fn new(sector: Sector, level: Arc<Level>, row: i32, column: i32) -> Self {
        let key = TileKey::new(level.number(), row, column, Arc::clone(level.namespace()));
        Self {
            sector,
            level,
            row,
            column,
            key,
        }
    }

    #[must_use]
    pub fn sector(&self) -> Sector {
        self.sector
    }

    #[must_use]
    pub fn level(&self) -> &Arc<Level> {
        &self.level
    }

    #[must_use]
    pub fn level_number(&self) -> u32 {
        self.level.number()
    }

    #[must_use]
    pub fn row(&self) -> i32 {
        self.row
    }

    #[must_use]
    pub fn column(&self) -> i32 {
        self.column
    }

    #[must_use]
    pub fn key(&self) -> &TileKey {
        &self.key
    }

    /// Relative path of this tile in the persistent store.
    #[must_use]
    pub fn path(&self) -> String {
        self.level.tile_path(self.row, self.column)
    }

    /// Service URL of this tile.
    #[must_use]
    pub fn url(&self) -> String {
        self.level.tile_url(self.row, self.column)
    }

    #[must_use]
    pub fn centroid(&self) -> LatLon {
        self.sector.centroid()
    }
}

/// The globe tiles are projected onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Globe {
    pub radius: f64,
}

impl Globe {
    /// Earth's mean radius in meters.
    pub const EARTH_RADIUS: f64 = 6_371_000.0;

    #[must_use]
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Changes whenever cached tile extents must be recomputed.
    #[must_use]
    pub fn state_key(&self) -> u64 {
        self.radius.to_bits()
    }
}

impl Default for Globe {
    fn default() -> Self {
        Self::new(Self::EARTH_RADIUS)
    }
}

/// Bounding sphere of a tile on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub center: DVec3,
    pub radius: f64,
}

impl Extent {
    /// Samples per sector edge when fitting the sphere.
    const SAMPLES: u32 = 5;

    /// Fit a bounding sphere to a grid of surface points across the sector.
    #[must_use]
    pub fn for_sector(sector: &Sector, globe: &Globe) -> Self {
        let steps = f64::from(Self::SAMPLES - 1);
        let points: Vec<DVec3> = (0..Self::SAMPLES)
            .flat_map(|i| (0..Self::SAMPLES).map(move |j| (f64::from(i), f64::from(j))))
            .map(|(i, j)| {
                LatLon::new(
                    sector.min_latitude + sector.delta_lat() * (i / steps),
                    sector.min_longitude + sector.delta_lon() * (j / steps),
                )
                .to_cartesian(globe.radius)
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let center = points.iter().copied().sum::<DVec3>() / points.len() as f64;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f64, f64::max);
        Self { center, radius }
    }

    #[must_use]
    pub fn intersects(&self, frustum: &Frustum) -> bool {
        frustum.intersects_sphere(self.center, self.radius)
    }
}

/// Maps a tile's unit texture square into the texture it is drawn with.
///
/// Identity for tiles drawn with their own texture; for fallback tiles it
/// selects the sub-rectangle of the ancestor's texture covering the tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoordTransform {
    pub offset: Vec2,
    pub scale: Vec2,
}

impl TexCoordTransform {
    pub const IDENTITY: TexCoordTransform = TexCoordTransform {
        offset: Vec2::ZERO,
        scale: Vec2::ONE,
    };

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn for_fallback(tile: &Sector, fallback: &Sector) -> Self {
        let fb_dlon = fallback.delta_lon().degrees();
        let fb_dlat = fallback.delta_lat().degrees();
        Self {
            offset: Vec2::new(
                ((tile.min_longitude - fallback.min_longitude).degrees() / fb_dlon) as f32,
                ((tile.min_latitude - fallback.min_latitude).degrees() / fb_dlat) as f32,
            ),
            scale: Vec2::new(
                (tile.delta_lon().degrees() / fb_dlon) as f32,
                (tile.delta_lat().degrees() / fb_dlat) as f32,
            ),
        }
    }
}

/// A tile that carries imagery.
///
/// Geometry is fixed at construction. The extent is cached per globe state
/// and the pending slot hands freshly decoded data over to the texture cache
/// exactly once.
#[derive(Debug)]
pub struct TextureTile {
    tile: Tile,
    extent: Mutex<Option<(u64, Extent)>>,
    pending: Mutex<Option<(DecodedTexture, usize)>>,
}

impl TextureTile {
    #[must_use]
    pub fn new(tile: Tile) -> Self {
        Self {
            tile,
            extent: Mutex::new(None),
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Bounding volume on `globe`, recomputed when the globe state changes.
    pub fn extent(&self, globe: &Globe) -> Extent {
        let key = globe.state_key();
        let mut cached = self.extent.lock().unwrap_or_else(PoisonError::into_inner);
        match *cached {
            Some((cached_key, extent)) if cached_key == key => extent,
            _ => {
                let extent = Extent::for_sector(&self.tile.sector, globe);
                *cached = Some((key, extent));
                extent
            }
        }
    }

    /// The four children at `next_level`, in SW, SE, NW, NE order.
    #[must_use]
    pub fn create_sub_tiles(&self, next_level: &Arc<Level>) -> [Arc<TextureTile>; 4] {
        let row = self.tile.row * 2;
        let column = self.tile.column * 2;
        let [sw, se, nw, ne] = self.tile.sector.subdivide();
        let child = |sector, row, column| {
            Arc::new(TextureTile::new(Tile::new(
                sector,
                Arc::clone(next_level),
                row,
                column,
            )))
        };
        [
            child(sw, row, column),
            child(se, row, column + 1),
            child(nw, row + 1, column),
            child(ne, row + 1, column + 1),
        ]
    }

    /// Whether `texture`, resident for this tile, predates the level's
    /// expiry time.
    #[must_use]
    pub fn is_texture_expired(&self, texture: &Texture) -> bool {
        self.tile.level.expiry_time().is_some_and(|expiry| {
            texture.update_time() < expiry && expiry <= SystemTime::now()
        })
    }

    /// Park decoded data until it is promoted into the texture cache.
    pub fn set_pending(&self, texture: DecodedTexture, size: usize) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some((texture, size));
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Move pending data into `cache`, stamped with the current time.
    ///
    /// Returns the cached texture, or `None` if nothing was pending or the
    /// texture is larger than the whole cache.
    pub fn promote_pending(&self, cache: &TileCache<Texture>) -> Option<Texture> {
        let (data, size) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let texture = Texture::new(data);
        if !cache.put(self.tile.key.clone(), texture.clone(), size) {
            return None;
        }
        Some(texture)
    }
}

impl Deref for TextureTile {
    type Target = Tile;

    fn deref(&self) -> &Tile {
        &self.tile
    }
}
