//! The level-of-detail model: tile keys, levels and level sets.
//!
//! A [`LevelSet`] is an ordered sequence of [`Level`]s sharing a bounding
//! sector and a tile origin. Row and column numbers are anchored to the
//! origin, so tiles from independently built level sets with the same origin
//! and level-zero delta line up exactly. Each level halves the tile delta of
//! the previous one.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use web_time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::geo::{Angle, LatLon, Sector};
use crate::tile::{TextureTile, Tile};

/// Identifies a tile within a cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: u32,
    pub row: i32,
    pub column: i32,
    pub namespace: Arc<str>,
}

impl TileKey {
    #[must_use]
    pub fn new(level: u32, row: i32, column: i32, namespace: Arc<str>) -> Self {
        Self {
            level,
            row,
            column,
            namespace,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.row, self.column)
    }
}

/// Configuration for building a [`LevelSet`].
///
/// Usually deserialized from a JSON layer description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelSetConfig {
    /// Dataset name, used as the root of every cache namespace and store path.
    pub dataset_name: String,
    /// Service URL template with `{level}`, `{row}`, `{col}` and `{ext}` placeholders.
    pub service: String,
    /// Image format suffix, without the dot.
    pub format_suffix: String,
    /// Number of levels, including empty ones.
    pub num_levels: u32,
    /// Number of leading levels without backing data.
    pub num_empty_levels: u32,
    /// Tile delta of level zero.
    pub level_zero_tile_delta: LatLon,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Bounding sector of the data.
    pub sector: Sector,
    /// Origin all row/column numbering is anchored to.
    pub tile_origin: LatLon,
    /// Data older than this (milliseconds since the Unix epoch) is stale.
    pub expiry_time: Option<u64>,
}

impl Default for LevelSetConfig {
    fn default() -> Self {
        Self {
            dataset_name: "imagery".to_string(),
            service: String::new(),
            format_suffix: "png".to_string(),
            num_levels: 5,
            num_empty_levels: 0,
            level_zero_tile_delta: LatLon::from_degrees(36.0, 36.0),
            tile_width: 512,
            tile_height: 512,
            sector: Sector::FULL_SPHERE,
            tile_origin: LatLon::from_degrees(-90.0, -180.0),
            expiry_time: None,
        }
    }
}

/// One resolution step of a [`LevelSet`].
#[derive(Debug)]
pub struct Level {
    number: u32,
    tile_delta: LatLon,
    tile_width: u32,
    tile_height: u32,
    namespace: Arc<str>,
    service: String,
    format_suffix: String,
    empty: bool,
    /// Milliseconds since the Unix epoch; zero means no expiry.
    expiry_millis: AtomicU64,
}

impl Level {
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn tile_delta(&self) -> LatLon {
        self.tile_delta
    }

    #[must_use]
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    #[must_use]
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Cache namespace shared by every tile of this level.
    #[must_use]
    pub fn namespace(&self) -> &Arc<str> {
        &self.namespace
    }

    /// Whether this level is a placeholder step with no backing data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Angular size of one texel at this level.
    #[must_use]
    pub fn texel_size(&self) -> Angle {
        self.tile_delta.latitude / f64::from(self.tile_height)
    }

    #[must_use]
    pub fn expiry_time(&self) -> Option<SystemTime> {
        match self.expiry_millis.load(Ordering::Acquire) {
            0 => None,
            millis => Some(UNIX_EPOCH + Duration::from_millis(millis)),
        }
    }

    /// Mark everything retrieved before `time` as stale.
    pub fn set_expiry_time(&self, time: Option<SystemTime>) {
        let millis = time
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self.expiry_millis.store(millis, Ordering::Release);
    }

    /// Relative path of a tile in the persistent store.
    #[must_use]
    pub fn tile_path(&self, row: i32, column: i32) -> String {
        format!(
            "{}/{row}/{row}_{column}.{}",
            self.namespace, self.format_suffix
        )
    }

    /// Service URL of a tile.
    #[must_use]
    pub fn tile_url(&self, row: i32, column: i32) -> String {
        self.service
            .replace("{level}", &self.number.to_string())
            .replace("{row}", &row.to_string())
            .replace("{col}", &column.to_string())
            .replace("{ext}", &self.format_suffix)
    }
}

/// Registry of tiles the data source confirmed do not exist.
#[derive(Debug, Default)]
pub struct AbsentResources {
    keys: Mutex<HashSet<TileKey>>,
}

impl AbsentResources {
    pub fn mark(&self, key: &TileKey) {
        self.lock().insert(key.clone());
    }

    pub fn unmark(&self, key: &TileKey) {
        self.lock().remove(key);
    }

    #[must_use]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.lock().contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<TileKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A rectangular block of tile positions at one level, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub level: u32,
    pub first_row: i32,
    pub last_row: i32,
    pub first_column: i32,
    pub last_column: i32,
}

impl TileRange {
    #[must_use]
    pub fn rows(&self) -> usize {
        usize::try_from(self.last_row - self.first_row + 1).unwrap_or(0)
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        usize::try_from(self.last_column - self.first_column + 1).unwrap_or(0)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.rows() * self.columns()
    }

    /// Row-major iterator over `(row, column)` positions.
    pub fn positions(&self) -> impl Iterator<Item = (i32, i32)> + use<> {
        let (first_column, last_column) = (self.first_column, self.last_column);
        (self.first_row..=self.last_row)
            .flat_map(move |row| (first_column..=last_column).map(move |column| (row, column)))
    }

    /// Partition into blocks of at most `max_tiles` positions.
    #[must_use]
    pub fn split(&self, max_tiles: usize) -> Vec<TileRange> {
        let max_tiles = max_tiles.max(1);
        if self.count() <= max_tiles {
            return vec![*self];
        }

        let chunk_rows = self.rows().min(max_tiles.isqrt()).max(1);
        let chunk_columns = self.columns().min(max_tiles / chunk_rows).max(1);
        let step_rows = i32::try_from(chunk_rows).unwrap_or(i32::MAX);
        let step_columns = i32::try_from(chunk_columns).unwrap_or(i32::MAX);

        let mut ranges = Vec::new();
        let mut row = self.first_row;
        while row <= self.last_row {
            let last_row = row.saturating_add(step_rows - 1).min(self.last_row);
            let mut column = self.first_column;
            while column <= self.last_column {
                let last_column = column.saturating_add(step_columns - 1).min(self.last_column);
                ranges.push(TileRange {
                    level: self.level,
                    first_row: row,
                    last_row,
                    first_column: column,
                    last_column,
                });
                column = last_column + 1;
            }
            row = last_row + 1;
        }
        ranges
    }
}

/// The ordered levels of one layer plus its shared tiling geometry.
#[derive(Debug)]
pub struct LevelSet {
    levels: Vec<Arc<Level>>,
    sector: Sector,
    tile_origin: LatLon,
    absent: AbsentResources,
}

impl LevelSet {
    /// Build a level set, validating the geometry.
    pub fn new(config: &LevelSetConfig) -> Result<Self> {
        if config.num_levels == 0 {
            return Err(Error::invalid_config("level set", "at least one level is required"));
        }
        if config.num_empty_levels >= config.num_levels {
            return Err(Error::invalid_config(
                "level set",
                format!(
                    "{} empty levels leave no data in {} levels",
                    config.num_empty_levels, config.num_levels
                ),
            ));
        }
        let delta = config.level_zero_tile_delta;
        if !(delta.latitude.degrees() > 0.0 && delta.longitude.degrees() > 0.0) {
            return Err(Error::invalid_config(
                "level set",
                format!("level zero tile delta must be positive, got {delta:?}"),
            ));
        }
        if config.tile_width == 0 || config.tile_height == 0 {
            return Err(Error::invalid_config("level set", "tile dimensions must be non-zero"));
        }
        if config.dataset_name.is_empty() {
            return Err(Error::invalid_config("level set", "dataset name must not be empty"));
        }
        config
            .sector
            .validate()
            .map_err(|e| Error::invalid_config("level set", e.to_string()))?;

        let finest = f64::powi(2.0, i32::try_from(config.num_levels - 1).unwrap_or(i32::MAX));
        let rows = grid_extent(
            config.sector.min_latitude,
            config.sector.max_latitude,
            config.tile_origin.latitude,
        ) / (delta.latitude.degrees() / finest);
        let columns = grid_extent(
            config.sector.min_longitude,
            config.sector.max_longitude,
            config.tile_origin.longitude,
        ) / (delta.longitude.degrees() / finest);
        let fits = rows.max(columns) < f64::from(i32::MAX);
        if !fits {
            return Err(Error::invalid_config(
                "level set",
                format!(
                    "tile numbers at level {} exceed the row and column range",
                    config.num_levels - 1
                ),
            ));
        }

        let expiry = config
            .expiry_time
            .map(|millis| UNIX_EPOCH + Duration::from_millis(millis));

        let mut levels = Vec::with_capacity(config.num_levels as usize);
        let mut tile_delta = delta;
        for number in 0..config.num_levels {
            let level = Level {
                number,
                tile_delta,
                tile_width: config.tile_width,
                tile_height: config.tile_height,
                namespace: Arc::from(format!("{}/{number}", config.dataset_name)),
                service: config.service.clone(),
                format_suffix: config.format_suffix.clone(),
                empty: number < config.num_empty_levels,
                expiry_millis: AtomicU64::new(0),
            };
            level.set_expiry_time(expiry);
            levels.push(Arc::new(level));
            tile_delta = LatLon::new(tile_delta.latitude / 2.0, tile_delta.longitude / 2.0);
        }

        Ok(Self {
            levels,
            sector: config.sector,
            tile_origin: config.tile_origin,
            absent: AbsentResources::default(),
        })
    }

    #[must_use]
    pub fn sector(&self) -> Sector {
        self.sector
    }

    #[must_use]
    pub fn tile_origin(&self) -> LatLon {
        self.tile_origin
    }

    #[must_use]
    pub fn levels(&self) -> &[Arc<Level>] {
        &self.levels
    }

    #[must_use]
    pub fn num_levels(&self) -> u32 {
        u32::try_from(self.levels.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn level(&self, number: u32) -> Option<&Arc<Level>> {
        self.levels.get(number as usize)
    }

    #[must_use]
    pub fn first_level(&self) -> &Arc<Level> {
        &self.levels[0]
    }

    #[must_use]
    pub fn last_level(&self) -> &Arc<Level> {
        &self.levels[self.levels.len() - 1]
    }

    /// Whether the level is missing or a placeholder without data.
    #[must_use]
    pub fn is_level_empty(&self, number: u32) -> bool {
        self.level(number).is_none_or(|level| level.is_empty())
    }

    #[must_use]
    pub fn is_final_level(&self, number: u32) -> bool {
        number + 1 >= self.num_levels()
    }

    pub fn mark_resource_absent(&self, key: &TileKey) {
        self.absent.mark(key);
    }

    #[must_use]
    pub fn is_resource_absent(&self, key: &TileKey) -> bool {
        self.absent.contains(key)
    }

    pub fn unmark_resource_absent(&self, key: &TileKey) {
        self.absent.unmark(key);
    }

    /// The registry of tiles known not to exist on the data source.
    #[must_use]
    pub fn absent_resources(&self) -> &AbsentResources {
        &self.absent
    }

    fn compute_row(&self, delta: Angle, latitude: Angle) -> i32 {
        cell_index((latitude - self.tile_origin.latitude).degrees() / delta.degrees())
    }

    fn compute_column(&self, delta: Angle, longitude: Angle) -> i32 {
        cell_index((longitude - self.tile_origin.longitude).degrees() / delta.degrees())
    }

    fn compute_last_row(&self, delta: Angle, latitude: Angle, first: i32) -> i32 {
        let ratio = (latitude - self.tile_origin.latitude).degrees() / delta.degrees();
        cell_index(ratio.ceil() - 1.0).max(first)
    }

    fn compute_last_column(&self, delta: Angle, longitude: Angle, first: i32) -> i32 {
        let ratio = (longitude - self.tile_origin.longitude).degrees() / delta.degrees();
        cell_index(ratio.ceil() - 1.0).max(first)
    }

    /// Key of the tile containing `location` at a level.
    #[must_use]
    pub fn key_for_location(&self, level: &Level, location: LatLon) -> TileKey {
        let delta = level.tile_delta();
        TileKey::new(
            level.number(),
            self.compute_row(delta.latitude, location.latitude),
            self.compute_column(delta.longitude, location.longitude),
            Arc::clone(level.namespace()),
        )
    }

    /// Geographic extent of a tile position.
    #[must_use]
    pub fn sector_for(&self, level: &Level, row: i32, column: i32) -> Sector {
        let delta = level.tile_delta();
        let min_latitude = self.tile_origin.latitude + delta.latitude * f64::from(row);
        let min_longitude = self.tile_origin.longitude + delta.longitude * f64::from(column);
        Sector {
            min_latitude,
            max_latitude: min_latitude + delta.latitude,
            min_longitude,
            max_longitude: min_longitude + delta.longitude,
        }
    }

    /// Geographic extent of the tile a key names.
    #[must_use]
    pub fn sector_for_key(&self, key: &TileKey) -> Option<Sector> {
        self.level(key.level)
            .map(|level| self.sector_for(level, key.row, key.column))
    }

    /// The block of tiles at `level` covering the part of `sector` inside this
    /// level set. Returns `None` when the two do not overlap.
    #[must_use]
    pub fn tile_range(&self, sector: &Sector, level: &Level) -> Option<TileRange> {
        let clipped = sector.intersection(&self.sector)?;
        let delta = level.tile_delta();
        let first_row = self.compute_row(delta.latitude, clipped.min_latitude);
        let first_column = self.compute_column(delta.longitude, clipped.min_longitude);
        Some(TileRange {
            level: level.number(),
            first_row,
            last_row: self.compute_last_row(delta.latitude, clipped.max_latitude, first_row),
            first_column,
            last_column: self.compute_last_column(
                delta.longitude,
                clipped.max_longitude,
                first_column,
            ),
        })
    }

    /// Tiles of a range, in row-major order.
    pub fn tiles_in_range<'a>(&'a self, range: &TileRange) -> impl Iterator<Item = Tile> + use<'a> {
        let level = self.level(range.level).cloned();
        range.positions().filter_map(move |(row, column)| {
            let level = level.as_ref()?;
            Some(Tile::new(
                self.sector_for(level, row, column),
                Arc::clone(level),
                row,
                column,
            ))
        })
    }

    /// Tiles at `level` covering `sector`.
    #[must_use]
    pub fn tiles_in_sector(&self, sector: &Sector, level: &Level) -> Vec<Tile> {
        self.tile_range(sector, level)
            .map(|range| self.tiles_in_range(&range).collect())
            .unwrap_or_default()
    }

    /// The level-zero tiles covering the bounding sector.
    #[must_use]
    pub fn create_top_level_tiles(&self) -> Vec<Arc<TextureTile>> {
        self.tiles_in_sector(&self.sector, self.first_level())
            .into_iter()
            .map(|tile| Arc::new(TextureTile::new(tile)))
            .collect()
    }

    /// The level to retrieve for a target resolution, in angle per texel.
    ///
    /// Of the two non-empty levels whose texel sizes straddle the resolution,
    /// the closer one wins. Resolutions finer than the last level select the
    /// last level. Returns `None` only when every level is empty.
    #[must_use]
    pub fn level_for_resolution(&self, resolution: Angle) -> Option<&Arc<Level>> {
        let mut coarser: Option<&Arc<Level>> = None;
        for level in self.levels.iter().filter(|level| !level.is_empty()) {
            let texel = level.texel_size();
            if texel > resolution {
                coarser = Some(level);
                continue;
            }
            return match coarser {
                Some(coarse)
                    if (coarse.texel_size() - resolution).degrees()
                        < (resolution - texel).degrees() =>
                {
                    Some(coarse)
                }
                _ => Some(level),
            };
        }
        coarser
    }
}

/// Degrees from `origin` to the farther of two bounds.
fn grid_extent(min: Angle, max: Angle, origin: Angle) -> f64 {
    (min - origin).degrees().abs().max((max - origin).degrees().abs())
}

#[allow(clippy::cast_possible_truncation)]
fn cell_index(ratio: f64) -> i32 {
    ratio.floor().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}
