//! Maps changed footprints onto tile index ranges.
//!
//! The resolver works on envelopes only: each footprint's bounding box
//! (optionally cut by clip boxes) is projected onto every zoom level in range.
//! Its output may overlap and repeat; the
//! [`TileEnumerator`](crate::enumerate::TileEnumerator) deduplicates.

use std::sync::Arc;

use geo::MultiPolygon;
use tracing::{debug, trace};

use crate::error::ChangesResult;
use crate::geometry::{BuiltinReprojector, Crs, Envelope, Reprojector};
use crate::grid::{GridMatrixSet, GridSubset, ZoomRange};

/// Turns modified footprints into [`GridSubset`]s of a tile matrix set.
#[derive(Clone)]
pub struct ModifiedRegionResolver {
    reprojector: Arc<dyn Reprojector>,
}

impl Default for ModifiedRegionResolver {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinReprojector::new()))
    }
}

impl ModifiedRegionResolver {
    pub fn new(reprojector: Arc<dyn Reprojector>) -> Self {
        Self { reprojector }
    }

    /// Grid subsets covering `geometries`, which are already in the frame of
    /// `gridset`.
    ///
    /// Produces one subset per geometry, zoom level and non-empty clip
    /// intersection. Without clip boxes (or with an empty list) the whole
    /// geometry envelope is used. Zoom levels the set does not define are
    /// skipped.
    pub fn resolve(
        &self,
        geometries: &[MultiPolygon<f64>],
        gridset: &GridMatrixSet,
        clip_boxes: Option<&[Envelope]>,
        zoom_range: ZoomRange,
    ) -> Vec<GridSubset> {
        let zoom_range = clamp_to_gridset(zoom_range, gridset);
        if geometries.is_empty() || zoom_range.is_empty() {
            return Vec::new();
        }

        let clip_boxes = clip_boxes.filter(|boxes| !boxes.is_empty());
        let mut subsets = Vec::new();

        for geometry in geometries {
            let envelope = Envelope::from_multi_polygon(geometry);
            let regions: Vec<Envelope> = match clip_boxes {
                None => vec![envelope],
                Some(boxes) => boxes
                    .iter()
                    .map(|clip| envelope.intersection(clip))
                    .filter(|region| !region.is_empty())
                    .collect(),
            };

            for region in &regions {
                for zoom in zoom_range.iter() {
                    let subset = gridset.tile_coverage(region, zoom);
                    trace!(%region, %subset, "Resolved region");
                    subsets.push(subset);
                }
            }
        }

        debug!(
            gridset = gridset.id(),
            geometries = geometries.len(),
            zoom_range = %zoom_range,
            subsets = subsets.len(),
            "Resolved modified regions"
        );
        subsets
    }

    /// Reproject `geometries` from `source_crs` into the frame of `gridset`,
    /// then [`resolve`](Self::resolve) them.
    ///
    /// A geometry that cannot be reprojected fails the whole call.
    pub fn resolve_from(
        &self,
        geometries: &[MultiPolygon<f64>],
        source_crs: Crs,
        gridset: &GridMatrixSet,
        clip_boxes: Option<&[Envelope]>,
        zoom_range: ZoomRange,
    ) -> ChangesResult<Vec<GridSubset>> {
        let projected = self.reproject_all(geometries, source_crs, gridset.crs())?;
        Ok(self.resolve(&projected, gridset, clip_boxes, zoom_range))
    }

    /// Reproject every geometry into `target`, failing on the first error.
    pub fn reproject_all(
        &self,
        geometries: &[MultiPolygon<f64>],
        source_crs: Crs,
        target: Crs,
    ) -> ChangesResult<Vec<MultiPolygon<f64>>> {
        if source_crs == target {
            return Ok(geometries.to_vec());
        }
        geometries
            .iter()
            .map(|g| Ok(self.reprojector.reproject(g, source_crs, target)?))
            .collect()
    }
}

impl std::fmt::Debug for ModifiedRegionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifiedRegionResolver").finish_non_exhaustive()
    }
}

fn clamp_to_gridset(zoom_range: ZoomRange, gridset: &GridMatrixSet) -> ZoomRange {
    let full = gridset.full_zoom_range();
    ZoomRange::new(
        zoom_range.start.max(full.start),
        zoom_range.end.min(full.end),
    )
}
