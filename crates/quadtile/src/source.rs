//! Tile payload sources.
//!
//! A [`TileSource`] retrieves the raw bytes of one tile and reports one of
//! three outcomes: the bytes, a definitive "does not exist", or a transient
//! failure worth retrying later.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::store::TileStore;
use crate::tile::Tile;

/// Result of asking a source for one tile.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The tile's raw bytes.
    Found(Vec<u8>),
    /// The source confirmed the tile does not exist.
    NotFound,
    /// The request failed; the tile may exist.
    Failed(Error),
}

/// Future type for source fetches.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>>;

/// Something that can produce raw tile bytes.
pub trait TileSource: Send + Sync {
    fn fetch(&self, tile: &Tile) -> FetchFuture<'_>;
}

/// Fetches tiles over HTTP using each level's URL template.
///
/// `204 No Content` and `404 Not Found` mean the tile does not exist; any
/// other non-success status or a transport error is a transient failure.
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    http: reqwest::Client,
}

impl HttpSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured HTTP client (timeouts, user agent, proxies).
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl TileSource for HttpSource {
    fn fetch(&self, tile: &Tile) -> FetchFuture<'_> {
        let url = tile.url();
        Box::pin(async move {
            tracing::debug!(url = %url, "fetching");

            let response = match self.http.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    return FetchOutcome::Failed(Error::Http {
                        url,
                        message: e.to_string(),
                    });
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::NOT_FOUND
            {
                return FetchOutcome::NotFound;
            }
            if !status.is_success() {
                return FetchOutcome::Failed(Error::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            match response.bytes().await {
                Ok(data) => FetchOutcome::Found(data.to_vec()),
                Err(e) => FetchOutcome::Failed(Error::Http {
                    url,
                    message: e.to_string(),
                }),
            }
        })
    }
}

/// Serves tiles out of another store, such as a pre-seeded directory.
#[derive(Clone)]
pub struct StoreSource {
    store: Arc<dyn TileStore>,
}

impl StoreSource {
    #[must_use]
    pub fn new(store: Arc<dyn TileStore>) -> Self {
        Self { store }
    }
}

impl TileSource for StoreSource {
    fn fetch(&self, tile: &Tile) -> FetchFuture<'_> {
        let path = tile.path();
        Box::pin(async move {
            match self.store.get(&path).await {
                Ok(Some(data)) => FetchOutcome::Found(data),
                Ok(None) => FetchOutcome::NotFound,
                Err(e) => FetchOutcome::Failed(e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelSet, LevelSetConfig};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_store_source_outcomes() {
        let levels = LevelSet::new(&LevelSetConfig::default()).unwrap();
        let tiles = levels.create_top_level_tiles();
        let seeded = MemoryStore::new();
        seeded.put(&tiles[0].path(), vec![7; 4]).await.unwrap();

        let source = StoreSource::new(Arc::new(seeded));
        assert!(matches!(
            source.fetch(tiles[0].tile()).await,
            FetchOutcome::Found(data) if data == vec![7; 4]
        ));
        assert!(matches!(
            source.fetch(tiles[1].tile()).await,
            FetchOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_http_source_unreachable_is_transient() {
        let levels = LevelSet::new(&LevelSetConfig {
            service: "http://127.0.0.1:9/{level}/{row}/{col}.{ext}".to_string(),
            ..LevelSetConfig::default()
        })
        .unwrap();
        let tiles = levels.create_top_level_tiles();

        let outcome = HttpSource::new().fetch(tiles[0].tile()).await;
        assert!(matches!(outcome, FetchOutcome::Failed(Error::Http { .. })));
    }
}
