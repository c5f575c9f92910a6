//! Command-line front end for bulk tile retrieval.
//!
//! `quadtile bulk` pre-fetches every missing tile of a region into a store
//! directory, printing progress until done; Ctrl-C stops it cooperatively.
//! `quadtile estimate` only counts what is missing.

mod args;

use std::process::ExitCode;
use std::sync::Arc;

use args::{Cli, Command, LayerFile, TargetArgs};
use clap::Parser;
use quadtile::{
    Angle, BulkProgress, BulkRetrieval, BulkState, CancellationToken, FileStore, HttpSource,
    LevelSet, Result, StoreSource, TaskPool, TileSource,
};

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Command::Bulk {
                target,
                workers,
                source_dir,
            } => bulk(target, workers, source_dir).await,
            Command::Estimate { target } => estimate(target).await,
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "quadtile failed");
            ExitCode::FAILURE
        }
    }
}

/// Build the retrieval a command describes.
fn prepare(
    target: &TargetArgs,
    workers: usize,
    source: Option<Arc<dyn TileSource>>,
) -> Result<BulkRetrieval> {
    let layer = LayerFile::load(&target.layer)?;
    let levels = Arc::new(LevelSet::new(&layer.levels)?);
    let source = source.unwrap_or_else(|| Arc::new(HttpSource::new()) as Arc<dyn TileSource>);
    BulkRetrieval::new(
        levels,
        source,
        Arc::new(FileStore::new(&target.store)),
        TaskPool::current(workers)?,
        target.region,
        Angle::from_degrees(target.resolution),
        layer.bulk,
    )
}

async fn estimate(target: TargetArgs) -> Result<()> {
    let retrieval = prepare(&target, 1, None)?;
    let estimate = retrieval.estimate(&CancellationToken::new()).await?;
    println!(
        "level {}: {} missing tiles, about {:.1} MB",
        retrieval.target_level(),
        estimate.tile_count,
        megabytes(estimate.total_size)
    );
    Ok(())
}

async fn bulk(
    target: TargetArgs,
    workers: usize,
    source_dir: Option<std::path::PathBuf>,
) -> Result<()> {
    let source = source_dir.map(|dir| -> Arc<dyn TileSource> {
        Arc::new(StoreSource::new(Arc::new(FileStore::new(dir))))
    });
    let retrieval = prepare(&target, workers, source)?;
    tracing::info!(
        region = %target.region,
        level = retrieval.target_level(),
        workers,
        "retrieving"
    );

    let handle = retrieval.spawn();
    let mut progress = handle.progress();
    let mut last_percent = None;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                }
                tracing::info!("cancelling");
                handle.cancel();
                break;
            }
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = progress.borrow_and_update().clone();
                let percent = percent_done(&snapshot);
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    print_progress(&snapshot, percent);
                }
                if snapshot.state.is_finished() {
                    break;
                }
            }
        }
    }

    let state = handle.join().await?;
    let done = progress.borrow().clone();
    println!(
        "{state}: {} retrieved, {} failed, {:.1} MB",
        done.current_count,
        done.failed_count,
        megabytes(done.current_size)
    );
    if state == BulkState::Completed && done.failed_count > 0 {
        tracing::warn!(failed = done.failed_count, "some tiles failed; run again to retry");
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_done(progress: &BulkProgress) -> u8 {
    if progress.total_count == 0 {
        return 0;
    }
    let ratio = progress.resolved_count() as f64 / progress.total_count as f64;
    (ratio * 100.0).clamp(0.0, 100.0) as u8
}

fn print_progress(progress: &BulkProgress, percent: u8) {
    println!(
        "[{}] {percent:3}% {}/{} tiles, {:.1}/{:.1} MB",
        progress.state,
        progress.resolved_count(),
        progress.total_count,
        megabytes(progress.current_size),
        megabytes(progress.total_size)
    );
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1_000_000.0
}
