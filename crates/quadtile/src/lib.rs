//! Multi-resolution tiled imagery: level hierarchy, caching, streaming and
//! bulk retrieval.
//!
//! A layer's imagery is cut into a quad-tree of tiles described by a
//! [`LevelSet`]. Each frame a [`TileAssembler`] picks the tiles detailed
//! enough for the current view, drawing missing ones with a coarser
//! ancestor's texture while a [`TileFetcher`] loads them in the background.
//! A [`BulkRetrieval`] pre-fetches every tile of a region into a persistent
//! [`TileStore`] independently of any view.
//!
//! # Design principles
//!
//! - **Never block the frame**: Missing tiles are requested, not awaited
//!   (level zero may be forced on request)
//! - **Collaborators behind traits**: Sources, stores and decoders are
//!   object-safe traits returning boxed futures
//! - **Sync decoding**: Decoding lives in `quadtile-decode`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quadtile::{
//!     AssemblerConfig, CacheConfig, FileStore, HttpSource, LevelSet, LevelSetConfig,
//!     TaskPool, TileAssembler, TileCache, TileFetcher,
//! };
//!
//! let levels = Arc::new(LevelSet::new(&LevelSetConfig::default())?);
//! let textures = Arc::new(TileCache::new("textures", CacheConfig::with_capacity(256 << 20))?);
//! let fetcher = Arc::new(TileFetcher::new(
//!     levels,
//!     textures,
//!     Arc::new(FileStore::new("tiles")),
//!     Arc::new(HttpSource::new()),
//!     TaskPool::new(runtime.handle().clone(), 8)?,
//! ));
//! let mut assembler = TileAssembler::new(fetcher, AssemblerConfig::default())?;
//!
//! for tile in assembler.assemble(&view) {
//!     draw(&tile.texture, tile.tile.sector(), tile.tex_coords);
//! }
//! ```

pub mod assembler;
pub mod bulk;
pub mod cache;
mod error;
pub mod fetch;
pub mod geo;
pub mod level;
pub mod pool;
pub mod queue;
pub mod source;
pub mod store;
pub mod tile;
pub mod view;

#[cfg(test)]
mod testing;

pub use assembler::{AssembledTile, AssemblerConfig, TileAssembler};
pub use bulk::{BulkConfig, BulkEstimate, BulkHandle, BulkProgress, BulkRetrieval, BulkState};
pub use cache::{CacheConfig, TileCache};
pub use error::{Error, Result};
pub use fetch::{FetchRequest, ImageDecoder, TileDecoder, TileFetcher};
pub use geo::{Angle, LatLon, Sector};
pub use level::{Level, LevelSet, LevelSetConfig, TileKey, TileRange};
pub use pool::TaskPool;
pub use queue::{Prioritized, RequestQueue, WorkerPool};
pub use source::{FetchOutcome, HttpSource, StoreSource, TileSource};
#[cfg(not(target_family = "wasm"))]
pub use store::FileStore;
pub use store::{MemoryStore, NoStore, TileStore};
pub use tile::{Extent, Globe, TexCoordTransform, Texture, TextureTile, Tile};
pub use view::{Frustum, ViewState};

// Re-export decode types for convenience.
pub use quadtile_decode::DecodedTexture;

pub use tokio_util::sync::CancellationToken;
