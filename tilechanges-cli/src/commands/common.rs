//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::{Geometry, MultiPolygon};
use tilechanges::config::{config_file_path, BackendKind, ConfigFile};
use tilechanges::store::CheckpointBackend;
use tilechanges::{
    BuiltinReprojector, ChangesetService, CheckpointStore, Crs, Envelope, FileBackend,
    GridSetRegistry, MemoryBackend, Reprojector,
};
use tracing::debug;

use crate::error::CliError;

/// Options every command sees.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Config file override.
    pub config_path: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(config_file_path)
    }

    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        Ok(ConfigFile::load_from(self.config_path())?)
    }
}

/// Build a changeset service from configuration.
pub fn build_service(config: &ConfigFile) -> Result<ChangesetService, CliError> {
    let backend: Arc<dyn CheckpointBackend> = match config.store.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::File => Arc::new(open_file_backend(&config.store.directory)?),
    };
    let reprojector: Arc<dyn Reprojector> = Arc::new(BuiltinReprojector::new());
    let store = CheckpointStore::new(backend)
        .with_native_crs(config.store.native_crs)
        .with_reprojector(Arc::clone(&reprojector));

    debug!(
        backend = %config.store.backend,
        native_crs = %config.store.native_crs,
        "Opening checkpoint store"
    );

    Ok(ChangesetService::new(
        Arc::new(store),
        Arc::new(GridSetRegistry::with_builtins()),
        reprojector,
    )?)
}

fn open_file_backend(directory: &Path) -> Result<FileBackend, CliError> {
    FileBackend::open(directory).map_err(|e| {
        CliError::Config(format!(
            "cannot open checkpoint directory {}: {}",
            directory.display(),
            e
        ))
    })
}

/// Parse `minx,miny,maxx,maxy` boxes.
pub fn parse_envelopes(values: &[String]) -> Result<Vec<Envelope>, CliError> {
    values
        .iter()
        .map(|value| {
            value
                .parse::<Envelope>()
                .map_err(|e| CliError::Input(e.to_string()))
        })
        .collect()
}

/// Footprint made of one rectangle per box.
pub fn envelopes_to_geometry(envelopes: &[Envelope]) -> Result<Geometry<f64>, CliError> {
    let polygons = envelopes
        .iter()
        .map(|envelope| {
            envelope
                .to_polygon()
                .ok_or_else(|| CliError::Input(format!("empty bounding box: {}", envelope)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if polygons.is_empty() {
        return Err(CliError::Input("at least one --bbox is required".to_string()));
    }
    Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
}

/// Parse a CRS argument such as `EPSG:3857` or `CRS84`.
pub fn parse_crs(value: &str) -> Result<Crs, CliError> {
    value
        .parse::<Crs>()
        .map_err(|e| CliError::Input(e.to_string()))
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
