//! Command-line arguments and layer files.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use quadtile::{BulkConfig, Error, LevelSetConfig, Result, Sector};
use serde::{Deserialize, Serialize};

/// Default number of concurrent tile requests.
const DEFAULT_WORKERS: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "quadtile", about = "Bulk retrieval of tiled imagery")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve every missing tile of a region into the store.
    Bulk {
        #[command(flatten)]
        target: TargetArgs,

        /// Concurrent tile requests.
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        /// Serve tiles from this directory instead of the layer's service URL.
        #[arg(long)]
        source_dir: Option<PathBuf>,
    },
    /// Count the missing tiles of a region and estimate their size.
    Estimate {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// What to retrieve and where to put it.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Layer description (JSON).
    #[arg(long)]
    pub layer: PathBuf,

    /// Directory tiles are stored in.
    #[arg(long)]
    pub store: PathBuf,

    /// Region as MIN_LAT,MAX_LAT,MIN_LON,MAX_LON in degrees.
    #[arg(long, value_parser = parse_sector, allow_hyphen_values = true)]
    pub region: Sector,

    /// Target resolution in degrees per texel.
    #[arg(long)]
    pub resolution: f64,
}

/// A layer description file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerFile {
    pub levels: LevelSetConfig,
    pub bulk: BulkConfig,
}

impl LayerFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| Error::InvalidConfig {
            context: "layer file",
            detail: format!("{}: {e}", path.display()),
        })
    }
}

/// Parse `MIN_LAT,MAX_LAT,MIN_LON,MAX_LON` into a sector.
fn parse_sector(s: &str) -> std::result::Result<Sector, String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid coordinate '{part}': {e}"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let [min_lat, max_lat, min_lon, max_lon] = values[..] else {
        return Err(format!(
            "expected MIN_LAT,MAX_LAT,MIN_LON,MAX_LON, got {} values",
            values.len()
        ));
    };
    Sector::try_from_degrees(min_lat, max_lat, min_lon, max_lon).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sector() {
        let sector = parse_sector("-10, 20.5,-180,0").unwrap();
        assert_eq!(sector, Sector::from_degrees(-10.0, 20.5, -180.0, 0.0));

        assert!(parse_sector("1,2,3").is_err());
        assert!(parse_sector("1,2,3,x").is_err());
        assert!(parse_sector("20,10,0,10").is_err());
        assert!(parse_sector("0,10,0,200").is_err());
    }

    #[test]
    fn test_cli_parses_bulk() {
        let cli = Cli::try_parse_from([
            "quadtile",
            "bulk",
            "--layer",
            "layer.json",
            "--store",
            "tiles",
            "--region",
            "-10,10,-20,20",
            "--resolution",
            "0.01",
        ])
        .unwrap();
        let Command::Bulk {
            target, workers, ..
        } = cli.command
        else {
            panic!("expected bulk");
        };
        assert_eq!(workers, DEFAULT_WORKERS);
        assert_eq!(target.region, Sector::from_degrees(-10.0, 10.0, -20.0, 20.0));
        assert!((target.resolution - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_layer_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.json");
        std::fs::write(
            &path,
            r#"{ "levels": { "dataset_name": "bmng", "num_levels": 7 } }"#,
        )
        .unwrap();

        let layer = LayerFile::load(&path).unwrap();
        assert_eq!(layer.levels.dataset_name, "bmng");
        assert_eq!(layer.levels.num_levels, 7);
        assert_eq!(layer.levels.tile_width, 512);
        assert_eq!(layer.bulk, BulkConfig::default());
    }

    #[test]
    fn test_layer_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LayerFile::load(&dir.path().join("missing.json")),
            Err(Error::Io { .. })
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LayerFile::load(&path),
            Err(Error::InvalidConfig { .. })
        ));
    }
}
