//! `changes` command - report the tiles changed since a checkpoint.

use std::io::{self, BufWriter, Write};

use clap::Args;
use serde::Serialize;
use tilechanges::config::ConfigFile;
use tilechanges::{
    ChangeSummary, ChangesRequest, ChangesetOutcome, ChangesetService, CheckpointRef, ScaleRange,
    SpatialFilter,
};

use super::common::{envelopes_to_geometry, parse_crs, parse_envelopes, print_json};
use crate::error::CliError;

/// Arguments of the `changes` command.
#[derive(Debug, Args)]
pub struct ChangesArgs {
    /// Collection id
    #[arg(long)]
    pub collection: String,

    /// Report changes after this checkpoint id (INITIAL for everything)
    #[arg(long, default_value = "INITIAL")]
    pub checkpoint: String,

    /// Scale denominator range as min,max (either side may be empty)
    #[arg(long, default_value = ",", allow_hyphen_values = true)]
    pub scale: String,

    /// Tile matrix set id (defaults to changes.default_tile_matrix_set)
    #[arg(long)]
    pub tile_matrix_set: Option<String>,

    /// Only consider changes intersecting this minx,miny,maxx,maxy
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// CRS of --bbox
    #[arg(long, default_value = "EPSG:4326")]
    pub bbox_crs: String,

    /// Clip box in the tile matrix set's CRS (repeatable)
    #[arg(long = "clip", allow_hyphen_values = true)]
    pub clips: Vec<String>,

    /// Also print every changed tile as zoom/row/col
    #[arg(long)]
    pub tiles: bool,

    /// Stop printing tiles after this many
    #[arg(long, requires = "tiles")]
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Report<'a> {
    Modified {
        #[serde(flatten)]
        summary: &'a ChangeSummary,
    },
    NotModified {
        checkpoint_id: &'a str,
    },
}

/// Build the request described by `args`.
pub fn build_request(
    args: &ChangesArgs,
    config: &ConfigFile,
) -> Result<ChangesRequest, CliError> {
    let scale_range: ScaleRange = args.scale.parse()?;
    let checkpoint = CheckpointRef::from(args.checkpoint.as_str());
    let tile_matrix_set = args
        .tile_matrix_set
        .clone()
        .unwrap_or_else(|| config.changes.default_tile_matrix_set.clone());

    let mut request = ChangesRequest::new(args.collection.clone(), tile_matrix_set)
        .with_checkpoint(checkpoint)
        .with_scale_range(scale_range);

    if let Some(bbox) = &args.bbox {
        let geometry = envelopes_to_geometry(&parse_envelopes(std::slice::from_ref(bbox))?)?;
        let crs = parse_crs(&args.bbox_crs)?;
        request = request.with_spatial_filter(SpatialFilter::new(geometry, crs));
    }
    if !args.clips.is_empty() {
        request = request.with_clip_boxes(parse_envelopes(&args.clips)?);
    }
    Ok(request)
}

/// Run the `changes` command.
pub fn run(
    service: &ChangesetService,
    config: &ConfigFile,
    args: ChangesArgs,
) -> Result<(), CliError> {
    let request = build_request(&args, config)?;
    let outcome = service.changes(&request)?;

    match &outcome {
        ChangesetOutcome::NotModified { checkpoint_id } => {
            print_json(&Report::NotModified { checkpoint_id })?;
        }
        ChangesetOutcome::Modified(changeset) => {
            print_json(&Report::Modified {
                summary: changeset.summary(),
            })?;
            if args.tiles {
                write_tiles(changeset.tiles(), args.limit)?;
            }
        }
    }
    Ok(())
}

fn write_tiles(
    tiles: impl Iterator<Item = tilechanges::TileCoordinate>,
    limit: Option<u64>,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let limit = limit.unwrap_or(u64::MAX);
    for tile in tiles.take(limit.min(usize::MAX as u64) as usize) {
        writeln!(out, "{}", tile).map_err(|e| CliError::Output(e.to_string()))?;
    }
    out.flush().map_err(|e| CliError::Output(e.to_string()))
}
