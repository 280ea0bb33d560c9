//! Checkpoint CLI commands.
//!
//! Provides `checkpoint add`, `checkpoint latest` and `checkpoint list`.

use clap::Subcommand;
use serde::Serialize;
use tilechanges::geometry::Envelope;
use tilechanges::ChangesetService;

use super::common::{envelopes_to_geometry, parse_crs, parse_envelopes, print_json};
use crate::error::CliError;

/// Checkpoint subcommands.
#[derive(Debug, Subcommand)]
pub enum CheckpointCommands {
    /// Record a change to a collection
    Add {
        /// Collection id (registered on first use)
        collection: String,

        /// Changed area as minx,miny,maxx,maxy (repeatable)
        #[arg(long = "bbox", required = true, allow_hyphen_values = true)]
        bboxes: Vec<String>,

        /// CRS of the bounding boxes
        #[arg(long, default_value = "EPSG:4326")]
        crs: String,
    },

    /// Print the latest checkpoint of a collection
    Latest {
        /// Collection id
        collection: String,
    },

    /// List every checkpoint of a collection
    List {
        /// Collection id
        collection: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// One row of `checkpoint list --json`.
#[derive(Debug, Serialize)]
struct CheckpointRow {
    id: String,
    sequence: u64,
    timestamp: String,
    bbox: [f64; 4],
}

/// Run a checkpoint subcommand.
pub fn run(service: &ChangesetService, command: CheckpointCommands) -> Result<(), CliError> {
    match command {
        CheckpointCommands::Add {
            collection,
            bboxes,
            crs,
        } => run_add(service, &collection, &bboxes, &crs),
        CheckpointCommands::Latest { collection } => run_latest(service, &collection),
        CheckpointCommands::List { collection, json } => run_list(service, &collection, json),
    }
}

fn run_add(
    service: &ChangesetService,
    collection: &str,
    bboxes: &[String],
    crs: &str,
) -> Result<(), CliError> {
    let crs = parse_crs(crs)?;
    let geometry = envelopes_to_geometry(&parse_envelopes(bboxes)?)?;

    service.register_collection(collection);
    let id = service.record_change(collection, geometry, crs)?;
    println!("{}", id);
    Ok(())
}

fn run_latest(service: &ChangesetService, collection: &str) -> Result<(), CliError> {
    let latest = service.latest_checkpoint(collection)?;
    println!("{}", latest);
    Ok(())
}

fn run_list(service: &ChangesetService, collection: &str, json: bool) -> Result<(), CliError> {
    if !service.is_registered(collection) {
        return Err(tilechanges::ChangesError::UnknownCollection(collection.to_string()).into());
    }
    let rows: Vec<CheckpointRow> = service
        .store()
        .list_checkpoints(collection)?
        .into_iter()
        .map(|record| CheckpointRow {
            id: record.id,
            sequence: record.sequence,
            timestamp: record.timestamp.to_rfc3339(),
            bbox: Envelope::from_multi_polygon(&record.footprint).to_bbox(),
        })
        .collect();

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No checkpoints for {}", collection);
        return Ok(());
    }

    println!("{:<6} {:<34} {:<32} BBOX", "SEQ", "ID", "TIMESTAMP");
    for row in &rows {
        let [min_x, min_y, max_x, max_y] = row.bbox;
        println!(
            "{:<6} {:<34} {:<32} {},{},{},{}",
            row.sequence, row.id, row.timestamp, min_x, min_y, max_x, max_y
        );
    }
    Ok(())
}
