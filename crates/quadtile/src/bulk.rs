//! Bulk retrieval of every missing tile in a region.
//!
//! A [`BulkRetrieval`] walks the levels from zero down to the one matching a
//! target resolution, finds the tiles the persistent store lacks and fetches
//! them through the task pool, throttled to the pool's capacity. Progress is
//! published on a `watch` channel; cancellation is cooperative through a
//! [`CancellationToken`] checked at every tile.
//!
//! ```text
//! Idle -> Counting -> Fetching -> Completed | Cancelled | Failed
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use web_time::SystemTime;

use crate::error::{Error, Result};
use crate::geo::{Angle, Sector};
use crate::level::{Level, LevelSet, TileRange};
use crate::pool::TaskPool;
use crate::source::{FetchOutcome, TileSource};
use crate::store::TileStore;
use crate::tile::Tile;

/// Settings for a bulk retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Largest block of tiles enumerated at once.
    pub max_tiles_per_region: usize,
    /// Pause between submission passes.
    pub poll_interval_ms: u64,
    /// Pause at each region step.
    pub probe_delay_ms: u64,
    /// Size assumed per tile when the store has nothing to sample.
    pub default_tile_size: u64,
    /// Stored tiles sampled for the average tile size.
    pub size_samples: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_tiles_per_region: 200,
            poll_interval_ms: 100,
            probe_delay_ms: 1,
            default_tile_size: 350_000,
            size_samples: 10,
        }
    }
}

impl BulkConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }
}

/// Where a bulk retrieval is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkState {
    #[default]
    Idle,
    Counting,
    Fetching,
    Completed,
    Cancelled,
    Failed,
}

impl BulkState {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for BulkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Counting => "counting",
            Self::Fetching => "fetching",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A snapshot of bulk retrieval progress.
///
/// Counts never decrease while the retrieval runs, except `total_count`,
/// which drops when a counted tile turns out not to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkProgress {
    pub state: BulkState,
    pub total_count: u64,
    pub current_count: u64,
    pub failed_count: u64,
    /// Estimated bytes to retrieve.
    pub total_size: u64,
    /// Bytes retrieved so far.
    pub current_size: u64,
    pub last_update: Option<SystemTime>,
}

impl BulkProgress {
    /// Tiles resolved so far, retrieved or failed.
    #[must_use]
    pub fn resolved_count(&self) -> u64 {
        self.current_count + self.failed_count
    }
}

/// Missing tiles and their estimated size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkEstimate {
    pub tile_count: u64,
    pub average_tile_size: u64,
    pub total_size: u64,
}

/// How one tile retrieval ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retrieval {
    Stored(u64),
    NotFound,
    Failed,
}

/// Fetch one tile's bytes from `source` into `store`, without decoding.
async fn retrieve(
    levels: &LevelSet,
    source: &dyn TileSource,
    store: &dyn TileStore,
    tile: &Tile,
) -> Retrieval {
    match source.fetch(tile).await {
        FetchOutcome::Found(data) => {
            let size = data.len() as u64;
            match store.put(&tile.path(), data).await {
                Ok(()) => Retrieval::Stored(size),
                Err(e) => {
                    tracing::warn!(key = %tile.key(), error = %e, "failed to store tile");
                    Retrieval::Failed
                }
            }
        }
        FetchOutcome::NotFound => {
            levels.mark_resource_absent(tile.key());
            Retrieval::NotFound
        }
        FetchOutcome::Failed(e) => {
            tracing::debug!(key = %tile.key(), error = %e, "bulk fetch failed");
            Retrieval::Failed
        }
    }
}

/// Retrieves all missing tiles of a region down to a target resolution.
#[derive(Clone)]
pub struct BulkRetrieval {
    levels: Arc<LevelSet>,
    source: Arc<dyn TileSource>,
    store: Arc<dyn TileStore>,
    pool: TaskPool,
    sector: Sector,
    target_level: u32,
    config: BulkConfig,
}

impl BulkRetrieval {
    /// Prepare a retrieval of `sector` at `resolution` (angle per texel).
    pub fn new(
        levels: Arc<LevelSet>,
        source: Arc<dyn TileSource>,
        store: Arc<dyn TileStore>,
        pool: TaskPool,
        sector: Sector,
        resolution: Angle,
        config: BulkConfig,
    ) -> Result<Self> {
        if !(resolution.degrees().is_finite() && resolution.degrees() > 0.0) {
            return Err(Error::invalid_argument(
                "resolution",
                format!("must be positive, got {resolution}"),
            ));
        }
        sector
            .validate()
            .map_err(|e| Error::invalid_argument("sector", e.to_string()))?;
        if config.max_tiles_per_region == 0 {
            return Err(Error::invalid_config(
                "bulk retrieval",
                "regions must hold at least one tile",
            ));
        }
        let target_level = levels
            .level_for_resolution(resolution)
            .ok_or_else(|| Error::invalid_config("bulk retrieval", "every level is empty"))?
            .number();

        Ok(Self {
            levels,
            source,
            store,
            pool,
            sector,
            target_level,
            config,
        })
    }

    /// The finest level retrieved.
    #[must_use]
    pub fn target_level(&self) -> u32 {
        self.target_level
    }

    #[must_use]
    pub fn sector(&self) -> Sector {
        self.sector
    }

    #[must_use]
    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Non-empty levels from zero to the target, each with its tile blocks.
    fn regions(&self) -> impl Iterator<Item = (&Arc<Level>, Vec<TileRange>)> + '_ {
        self.levels
            .levels()
            .iter()
            .take(self.target_level as usize + 1)
            .filter(|level| !level.is_empty())
            .filter_map(|level| {
                let range = self.levels.tile_range(&self.sector, level)?;
                Some((level, range.split(self.config.max_tiles_per_region)))
            })
    }

    async fn is_local(&self, tile: &Tile) -> Result<bool> {
        self.store
            .contains(&tile.path(), tile.level().expiry_time())
            .await
            .map_err(|e| Error::Store {
                operation: "contains",
                message: e.to_string(),
            })
    }

    /// Count the missing tiles and estimate their size.
    pub async fn estimate(&self, cancel: &CancellationToken) -> Result<BulkEstimate> {
        let mut tile_count = 0u64;
        let mut samples: Vec<u64> = Vec::with_capacity(self.config.size_samples);

        for (_, ranges) in self.regions() {
            for range in ranges {
                for tile in self.levels.tiles_in_range(&range) {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    if self.levels.is_resource_absent(tile.key()) {
                        continue;
                    }
                    if !self.is_local(&tile).await? {
                        tile_count += 1;
                        continue;
                    }
                    if samples.len() >= self.config.size_samples {
                        continue;
                    }
                    if let Ok(Some(size)) = self.store.size(&tile.path()).await {
                        samples.push(size);
                    }
                }
            }
        }

        let average_tile_size = if samples.is_empty() {
            self.config.default_tile_size
        } else {
            let total = samples
                .iter()
                .fold(0u64, |sum, &size| sum.saturating_add(size));
            total / samples.len() as u64
        };
        Ok(BulkEstimate {
            tile_count,
            average_tile_size,
            total_size: tile_count.saturating_mul(average_tile_size),
        })
    }

    /// Tiles of a block that are neither stored locally nor known absent.
    pub async fn missing_tiles(
        &self,
        range: &TileRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<Tile>> {
        let mut missing = Vec::new();
        for tile in self.levels.tiles_in_range(range) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.levels.is_resource_absent(tile.key()) || self.is_local(&tile).await? {
                continue;
            }
            missing.push(tile);
        }
        Ok(missing)
    }

    /// Start the retrieval on the pool's runtime.
    #[must_use]
    pub fn spawn(self) -> BulkHandle {
        let cancel = CancellationToken::new();
        let (sender, progress) = watch::channel(BulkProgress::default());
        let runtime = self.pool.handle().clone();
        let task = runtime.spawn(self.run(cancel.clone(), sender));
        BulkHandle {
            cancel,
            progress,
            task,
        }
    }

    /// Run the retrieval to the end, publishing progress on `progress`.
    ///
    /// Cancellation is a normal outcome and returns `Ok(BulkState::Cancelled)`.
    /// Any other failure is logged, published as [`BulkState::Failed`] and
    /// returned.
    pub async fn run(
        self,
        cancel: CancellationToken,
        progress: watch::Sender<BulkProgress>,
    ) -> Result<BulkState> {
        tracing::info!(
            sector = %self.sector,
            target_level = self.target_level,
            "starting bulk retrieval"
        );

        let result = self.retrieve_all(&cancel, &progress).await;
        let (state, error) = match result {
            Ok(()) => (BulkState::Completed, None),
            Err(Error::Cancelled) => (BulkState::Cancelled, None),
            Err(e) => {
                tracing::error!(error = %e, "bulk retrieval failed");
                (BulkState::Failed, Some(e))
            }
        };

        progress.send_modify(|p| {
            p.state = state;
            if state == BulkState::Completed {
                p.total_count = p.resolved_count();
            }
            p.last_update = Some(SystemTime::now());
        });
        let snapshot = progress.borrow().clone();
        tracing::info!(
            %state,
            retrieved = snapshot.current_count,
            failed = snapshot.failed_count,
            total = snapshot.total_count,
            "bulk retrieval finished"
        );

        match error {
            Some(e) => Err(e),
            None => Ok(state),
        }
    }

    async fn retrieve_all(
        &self,
        cancel: &CancellationToken,
        progress: &watch::Sender<BulkProgress>,
    ) -> Result<()> {
        set_state(progress, BulkState::Counting);
        let estimate = self.estimate(cancel).await?;
        tracing::info!(
            tiles = estimate.tile_count,
            bytes = estimate.total_size,
            "counted missing tiles"
        );
        progress.send_modify(|p| {
            p.total_count = estimate.tile_count;
            p.total_size = estimate.total_size;
            p.last_update = Some(SystemTime::now());
        });

        set_state(progress, BulkState::Fetching);
        for (level, ranges) in self.regions() {
            tracing::debug!(level = level.number(), regions = ranges.len(), "retrieving level");
            for range in ranges {
                self.pause(cancel, self.config.probe_delay()).await?;
                let missing = self.missing_tiles(&range, cancel).await?;
                self.fetch_tiles(missing, estimate.average_tile_size, cancel, progress)
                    .await?;
            }
        }
        Ok(())
    }

    /// Submit tiles as the pool frees up until every one has a result.
    async fn fetch_tiles(
        &self,
        tiles: Vec<Tile>,
        average_tile_size: u64,
        cancel: &CancellationToken,
        progress: &watch::Sender<BulkProgress>,
    ) -> Result<()> {
        let (results_tx, mut results) = mpsc::unbounded_channel();
        let mut pending: VecDeque<Tile> = tiles.into();
        let mut outstanding = 0usize;

        loop {
            while !self.pool.is_full() {
                let Some(tile) = pending.pop_front() else {
                    break;
                };
                let levels = Arc::clone(&self.levels);
                let source = Arc::clone(&self.source);
                let store = Arc::clone(&self.store);
                let results_tx = results_tx.clone();
                let task_tile = tile.clone();
                let spawned = self.pool.try_spawn(async move {
                    let result = retrieve(&levels, &*source, &*store, &task_tile).await;
                    let _ = results_tx.send(result);
                });
                if !spawned {
                    pending.push_front(tile);
                    break;
                }
                outstanding += 1;
            }

            while let Ok(result) = results.try_recv() {
                outstanding -= 1;
                record(progress, result, average_tile_size);
            }

            if pending.is_empty() && outstanding == 0 {
                return Ok(());
            }
            self.pause(cancel, self.config.poll_interval()).await?;
        }
    }

    async fn pause(&self, cancel: &CancellationToken, delay: Duration) -> Result<()> {
        tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl fmt::Debug for BulkRetrieval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkRetrieval")
            .field("sector", &self.sector)
            .field("target_level", &self.target_level)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn set_state(progress: &watch::Sender<BulkProgress>, state: BulkState) {
    tracing::info!(%state, "bulk retrieval state");
    progress.send_modify(|p| {
        p.state = state;
        p.last_update = Some(SystemTime::now());
    });
}

fn record(progress: &watch::Sender<BulkProgress>, result: Retrieval, average_tile_size: u64) {
    progress.send_modify(|p| {
        match result {
            Retrieval::Stored(size) => {
                p.current_count += 1;
                p.current_size = p.current_size.saturating_add(size);
            }
            Retrieval::NotFound => {
                p.total_count = p.total_count.saturating_sub(1);
                p.total_size = p.total_size.saturating_sub(average_tile_size);
            }
            Retrieval::Failed => p.failed_count += 1,
        }
        p.total_count = p.total_count.max(p.resolved_count());
        p.last_update = Some(SystemTime::now());
    });
}

/// A running bulk retrieval.
#[derive(Debug)]
pub struct BulkHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<BulkProgress>,
    task: JoinHandle<Result<BulkState>>,
}

impl BulkHandle {
    /// Ask the retrieval to stop at its next tile.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A receiver for progress snapshots.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<BulkProgress> {
        self.progress.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the retrieval to end.
    pub async fn join(self) -> Result<BulkState> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelSetConfig, TileKey};
    use crate::store::MemoryStore;
    use crate::testing::{MockSource, Respond};

    /// Level one's texel size: 18 degrees over 512 pixels.
    const LEVEL_ONE: Angle = Angle::from_degrees(18.0 / 512.0);

    struct Fixture {
        levels: Arc<LevelSet>,
        store: Arc<MemoryStore>,
        source: Arc<MockSource>,
        pool: TaskPool,
    }

    fn fixture(source: MockSource, pool_size: usize) -> Fixture {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let levels = Arc::new(
            LevelSet::new(&LevelSetConfig {
                num_levels: 2,
                ..LevelSetConfig::default()
            })
            .unwrap(),
        );
        Fixture {
            levels,
            store: Arc::new(MemoryStore::new()),
            source: Arc::new(source),
            pool: TaskPool::current(pool_size).unwrap(),
        }
    }

    fn fast() -> BulkConfig {
        BulkConfig {
            poll_interval_ms: 5,
            ..BulkConfig::default()
        }
    }

    /// Upper-left quarter of the globe: 15 level-zero and 50 level-one tiles.
    fn region() -> Sector {
        Sector::from_degrees(0.0, 90.0, 0.0, 180.0)
    }

    impl Fixture {
        fn retrieval(&self, resolution: Angle, config: BulkConfig) -> BulkRetrieval {
            BulkRetrieval::new(
                Arc::clone(&self.levels),
                self.source.clone(),
                self.store.clone(),
                self.pool.clone(),
                region(),
                resolution,
                config,
            )
            .unwrap()
        }

        /// Store every level-zero tile of the region.
        async fn seed_level_zero(&self, size: usize) {
            for tile in self.levels.tiles_in_sector(&region(), self.levels.first_level()) {
                self.store.put(&tile.path(), vec![0; size]).await.unwrap();
            }
        }

        fn level_one_key(&self, row: i32, column: i32) -> TileKey {
            TileKey::new(
                1,
                row,
                column,
                Arc::clone(self.levels.level(1).unwrap().namespace()),
            )
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_retrieves_all_missing_tiles() {
        let f = fixture(
            MockSource::new(Respond::Found).with_delay(Duration::from_millis(2)),
            10,
        );
        f.seed_level_zero(1000).await;
        let retrieval = f.retrieval(LEVEL_ONE, fast());
        assert_eq!(retrieval.target_level(), 1);

        let estimate = retrieval.estimate(&CancellationToken::new()).await.unwrap();
        assert_eq!(estimate.tile_count, 50);
        assert_eq!(estimate.average_tile_size, 1000);
        assert_eq!(estimate.total_size, 50_000);

        let handle = retrieval.spawn();
        let progress = handle.progress();
        assert_eq!(handle.join().await.unwrap(), BulkState::Completed);

        let done = progress.borrow().clone();
        assert_eq!(done.state, BulkState::Completed);
        assert_eq!(done.current_count, 50);
        assert_eq!(done.total_count, 50);
        assert_eq!(done.failed_count, 0);
        assert!(done.last_update.is_some());
        assert_eq!(f.source.total_requests(), 50);
        assert_eq!(f.store.len(), 65);

        while f.pool.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_not_found_shrinks_total_and_is_never_missing_again() {
        let source = MockSource::new(Respond::Found);
        let f = fixture(source, 4);
        f.seed_level_zero(10).await;
        let absent: Vec<TileKey> = (0..5).map(|c| f.level_one_key(5, 10 + c)).collect();
        for key in &absent {
            f.source.respond(key, Respond::NotFound);
        }

        let retrieval = f.retrieval(LEVEL_ONE, fast());
        let again = retrieval.clone();
        let handle = retrieval.spawn();
        let progress = handle.progress();
        assert_eq!(handle.join().await.unwrap(), BulkState::Completed);

        let done = progress.borrow().clone();
        assert_eq!(done.current_count, 45);
        assert_eq!(done.total_count, 45);
        assert!(absent.iter().all(|key| f.levels.is_resource_absent(key)));

        let cancel = CancellationToken::new();
        let range = f
            .levels
            .tile_range(&region(), f.levels.level(1).unwrap())
            .unwrap();
        assert!(again.missing_tiles(&range, &cancel).await.unwrap().is_empty());
        assert_eq!(again.estimate(&cancel).await.unwrap().tile_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transient_failures_are_counted() {
        let f = fixture(MockSource::new(Respond::Found), 4);
        f.seed_level_zero(10).await;
        for column in 10..13 {
            f.source.respond(&f.level_one_key(6, column), Respond::Fail);
        }

        let handle = f.retrieval(LEVEL_ONE, fast()).spawn();
        let progress = handle.progress();
        assert_eq!(handle.join().await.unwrap(), BulkState::Completed);

        let done = progress.borrow().clone();
        assert_eq!(done.current_count, 47);
        assert_eq!(done.failed_count, 3);
        assert_eq!(done.total_count, 50);
        assert!(!f.levels.is_resource_absent(&f.level_one_key(6, 10)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancellation_is_clean() {
        let f = fixture(
            MockSource::new(Respond::Found).with_delay(Duration::from_millis(200)),
            2,
        );
        let handle = f.retrieval(LEVEL_ONE, fast()).spawn();
        let mut progress = handle.progress();
        progress
            .wait_for(|p| p.state == BulkState::Fetching)
            .await
            .unwrap();

        handle.cancel();
        assert_eq!(handle.join().await.unwrap(), BulkState::Cancelled);
        let done = progress.borrow().clone();
        assert_eq!(done.state, BulkState::Cancelled);
        assert!(done.current_count < 65);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_estimate_without_samples_uses_default_size() {
        let f = fixture(MockSource::new(Respond::Found), 4);
        let retrieval = f.retrieval(Angle::from_degrees(1.0), BulkConfig::default());
        assert_eq!(retrieval.target_level(), 0);

        let estimate = retrieval.estimate(&CancellationToken::new()).await.unwrap();
        assert_eq!(estimate.tile_count, 15);
        assert_eq!(estimate.average_tile_size, 350_000);
        assert_eq!(estimate.total_size, 15 * 350_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_estimate_saturates_instead_of_overflowing() {
        let f = fixture(MockSource::new(Respond::Found), 4);
        let config = BulkConfig {
            default_tile_size: u64::MAX / 2,
            ..BulkConfig::default()
        };
        let estimate = f
            .retrieval(Angle::from_degrees(1.0), config)
            .estimate(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(estimate.tile_count, 15);
        assert_eq!(estimate.total_size, u64::MAX);

        for tile in f.levels.tiles_in_sector(&region(), f.levels.first_level()) {
            f.store.insert_with_time(&tile.path(), vec![0; 8], SystemTime::now());
        }
        let stored = f
            .retrieval(LEVEL_ONE, BulkConfig::default())
            .estimate(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stored.tile_count, 50);
        assert_eq!(stored.average_tile_size, 8);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_small_regions_cover_the_same_tiles() {
        let f = fixture(MockSource::new(Respond::Found), 3);
        let config = BulkConfig {
            max_tiles_per_region: 7,
            ..fast()
        };

        let handle = f.retrieval(LEVEL_ONE, config).spawn();
        let progress = handle.progress();
        assert_eq!(handle.join().await.unwrap(), BulkState::Completed);
        assert_eq!(progress.borrow().current_count, 65);
        assert_eq!(f.store.len(), 65);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejects_bad_arguments() {
        let f = fixture(MockSource::new(Respond::Found), 1);
        for resolution in [Angle::ZERO, Angle::from_degrees(-1.0), Angle::from_degrees(f64::NAN)] {
            let result = BulkRetrieval::new(
                Arc::clone(&f.levels),
                f.source.clone(),
                f.store.clone(),
                f.pool.clone(),
                region(),
                resolution,
                BulkConfig::default(),
            );
            assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        }

        let inverted = Sector::from_degrees(10.0, 0.0, 0.0, 10.0);
        let result = BulkRetrieval::new(
            Arc::clone(&f.levels),
            f.source.clone(),
            f.store.clone(),
            f.pool.clone(),
            inverted,
            LEVEL_ONE,
            BulkConfig::default(),
        );
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }
}
