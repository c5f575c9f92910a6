//! Background tile loading.
//!
//! A [`TileFetcher`] turns a "this tile needs data" request into a texture in
//! the texture cache. It looks in the persistent store first, goes to the
//! source on a miss, writes retrieved bytes back to the store and hands the
//! decoded texture to the tile, which promotes it into the cache. The
//! assembler discovers the result on a later frame by finding the tile
//! resident.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use quadtile_decode::{DecodeError, DecodedTexture, decode_texture};

use crate::cache::TileCache;
use crate::error::{Error, Result};
use crate::level::{LevelSet, TileKey};
use crate::pool::TaskPool;
use crate::queue::{Prioritized, WorkerPool};
use crate::source::{FetchOutcome, TileSource};
use crate::store::TileStore;
use crate::tile::{Texture, TextureTile};

/// Turns raw tile bytes into a texture.
pub trait TileDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DecodedTexture>;
}

/// Decodes PNG and JPEG tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl TileDecoder for ImageDecoder {
    fn decode(&self, data: &[u8]) -> Result<DecodedTexture> {
        Ok(decode_texture(data)?)
    }
}

/// A request to load one tile's texture.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub tile: Arc<TextureTile>,
}

impl FetchRequest {
    #[must_use]
    pub fn new(tile: Arc<TextureTile>) -> Self {
        Self { tile }
    }
}

impl Prioritized for FetchRequest {
    fn priority(&self) -> u32 {
        self.tile.level_number()
    }
}

/// Loads tile textures from the store or the source.
pub struct TileFetcher {
    levels: Arc<LevelSet>,
    textures: Arc<TileCache<Texture>>,
    store: Arc<dyn TileStore>,
    source: Arc<dyn TileSource>,
    decoder: Arc<dyn TileDecoder>,
    pool: TaskPool,
    in_flight: Mutex<HashSet<TileKey>>,
}

impl TileFetcher {
    #[must_use]
    pub fn new(
        levels: Arc<LevelSet>,
        textures: Arc<TileCache<Texture>>,
        store: Arc<dyn TileStore>,
        source: Arc<dyn TileSource>,
        pool: TaskPool,
    ) -> Self {
        Self {
            levels,
            textures,
            store,
            source,
            decoder: Arc::new(ImageDecoder),
            pool,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    #[must_use]
    pub fn levels(&self) -> &Arc<LevelSet> {
        &self.levels
    }

    #[must_use]
    pub fn textures(&self) -> &Arc<TileCache<Texture>> {
        &self.textures
    }

    #[must_use]
    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// Whether a load for `key` is currently running.
    #[must_use]
    pub fn is_in_flight(&self, key: &TileKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Load a tile's texture and place it in the texture cache.
    ///
    /// Returns `None` when the tile could not be loaded. A source answering
    /// "not found" marks the tile absent in the level set; a transient
    /// failure leaves it eligible for another attempt.
    pub async fn load(&self, tile: &TextureTile) -> Option<Texture> {
        if let Some(texture) = self.load_from_store(tile).await {
            return Some(texture);
        }
        self.load_from_source(tile).await
    }

    /// Load a tile from the persistent store only, never touching the source.
    pub async fn load_local(&self, tile: &TextureTile) -> Option<Texture> {
        self.load_from_store(tile).await
    }

    /// [`load_local`](Self::load_local) on the pool's runtime, blocking the
    /// calling thread.
    pub fn load_local_blocking(&self, tile: &TextureTile) -> Option<Texture> {
        self.pool.block_on(self.load_local(tile))
    }

    /// Decode with the configured decoder and reject inconsistent output.
    fn decode(&self, data: &[u8]) -> Result<DecodedTexture> {
        let texture = self.decoder.decode(data)?;
        if !texture.is_valid() {
            return Err(Error::Decode(DecodeError::InvalidImage {
                context: "rgba",
                detail: format!(
                    "{} bytes for {}x{} pixels",
                    texture.data.len(),
                    texture.width,
                    texture.height
                ),
            }));
        }
        Ok(texture)
    }

    async fn load_from_store(&self, tile: &TextureTile) -> Option<Texture> {
        let path = tile.path();
        let not_before = tile.level().expiry_time();
        match self.store.contains(&path, not_before).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!(key = %tile.key(), error = %e, "store lookup failed");
                return None;
            }
        }

        let data = match self.store.get(&path).await {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %tile.key(), error = %e, "store read failed");
                return None;
            }
        };

        match self.decode(&data) {
            Ok(texture) => {
                tracing::debug!(key = %tile.key(), "loaded from store");
                self.install(tile, texture)
            }
            Err(e) => {
                tracing::warn!(key = %tile.key(), error = %e, "removing corrupt stored tile");
                if let Err(e) = self.store.remove(&path).await {
                    tracing::warn!(key = %tile.key(), error = %e, "failed to remove corrupt tile");
                }
                None
            }
        }
    }

    async fn load_from_source(&self, tile: &TextureTile) -> Option<Texture> {
        match self.source.fetch(tile.tile()).await {
            FetchOutcome::Found(data) => {
                let texture = match self.decode(&data) {
                    Ok(texture) => texture,
                    Err(e) => {
                        tracing::warn!(key = %tile.key(), error = %e, "undecodable tile from source");
                        return None;
                    }
                };
                if let Err(e) = self.store.put(&tile.path(), data).await {
                    tracing::warn!(key = %tile.key(), error = %e, "failed to persist tile");
                }
                tracing::debug!(key = %tile.key(), "retrieved");
                self.install(tile, texture)
            }
            FetchOutcome::NotFound => {
                tracing::debug!(key = %tile.key(), "tile absent on source");
                self.levels.mark_resource_absent(tile.key());
                None
            }
            FetchOutcome::Failed(e) => {
                tracing::debug!(key = %tile.key(), error = %e, "transient fetch failure");
                None
            }
        }
    }

    fn install(&self, tile: &TextureTile, texture: DecodedTexture) -> Option<Texture> {
        let size = texture.size_in_bytes();
        tile.set_pending(texture, size);
        tile.promote_pending(&self.textures)
    }
}

impl std::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetcher")
            .field("textures", &self.textures)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Clears a tile's in-flight mark when its load ends.
struct InFlight {
    fetcher: Arc<TileFetcher>,
    key: TileKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.fetcher
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl WorkerPool<FetchRequest> for Arc<TileFetcher> {
    fn is_full(&self) -> bool {
        self.pool.is_full()
    }

    fn submit(&self, request: FetchRequest) -> bool {
        let key = request.tile.key().clone();
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if !inserted {
            return false;
        }

        let guard = InFlight {
            fetcher: Arc::clone(self),
            key,
        };
        // A refused spawn drops the future, and the guard with it.
        self.pool.try_spawn(async move {
            guard.fetcher.load(&request.tile).await;
            drop(guard);
        })
    }
}
