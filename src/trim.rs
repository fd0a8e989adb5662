use geo::{BooleanOps, Intersects};
use geo_types::{Coord, MultiPolygon, Polygon, Rect};

use crate::{
    boundary::Region,
    error::{ChoromapError, ChoromapResult},
};

/// A region geometry override: replace one named region's geometry with the
/// dissolved union of its constituent polygons that intersect `window`.
///
/// This exists for regions that span the antimeridian: their multi-part
/// geometry straddles ±180° and renders as a streak across an
/// equirectangular map. Keeping only the parts inside a hand-picked window
/// trims the far-flung islands and leaves one compact landmass.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RegionOverride {
    /// Exact name of the region to rewrite.
    pub region: String,
    /// Reference rectangle in lon/lat degrees; constituent polygons that do
    /// not intersect it are dropped.
    pub window: Rect<f64>,
}

impl RegionOverride {
    pub fn new(region: impl Into<String>, window: Rect<f64>) -> Self {
        Self {
            region: region.into(),
            window,
        }
    }
}

impl Default for RegionOverride {
    /// The override for the US Census state boundary files: trim Alaska to
    /// the landmass east of the antimeridian.
    fn default() -> Self {
        Self::new(
            "Alaska",
            Rect::new(Coord { x: -180.0, y: 50.0 }, Coord { x: -100.0, y: 75.0 }),
        )
    }
}

/// Apply one geometry override to a region set.
///
/// Returns a new set in which only the target region's geometry is replaced;
/// the input is never mutated. The target must match exactly one region, and
/// the window must keep at least one constituent polygon.
pub fn apply_override(regions: &[Region], ov: &RegionOverride) -> ChoromapResult<Vec<Region>> {
    let mut matches = regions.iter().filter(|r| r.name == ov.region);
    let target = matches.next().ok_or_else(|| {
        ChoromapError::geometry(format!(
            "override target region '{}' not found in boundary set",
            ov.region
        ))
    })?;
    if matches.next().is_some() {
        return Err(ChoromapError::geometry(format!(
            "override target region '{}' matches more than one boundary row",
            ov.region
        )));
    }

    let trimmed = trim_to_window(&target.geometry, &ov.window)?;

    tracing::debug!(
        region = %ov.region,
        kept = trimmed.0.len(),
        total = target.geometry.0.len(),
        "applied region geometry override"
    );

    let mut out = regions.to_vec();
    for region in &mut out {
        if region.name == ov.region {
            region.geometry = trimmed;
            break;
        }
    }
    Ok(out)
}

/// Keep the constituent polygons intersecting `window` and dissolve them
/// into a single multipolygon.
///
/// A constituent appears in the output iff it intersects the window; an
/// already-trimmed geometry therefore passes through unchanged.
fn trim_to_window(geometry: &MultiPolygon<f64>, window: &Rect<f64>) -> ChoromapResult<MultiPolygon<f64>> {
    let window_poly = window.to_polygon();

    let kept: Vec<&Polygon<f64>> = geometry
        .iter()
        .filter(|p| p.intersects(&window_poly))
        .collect();

    if kept.is_empty() {
        return Err(ChoromapError::geometry(
            "override window keeps no constituent polygons (empty dissolve)",
        ));
    }

    let mut dissolved = MultiPolygon::new(vec![kept[0].clone()]);
    for poly in &kept[1..] {
        dissolved = dissolved.union(&MultiPolygon::new(vec![(*poly).clone()]));
    }
    Ok(dissolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Rect::new(
            Coord { x: x0, y: y0 },
            Coord {
                x: x0 + size,
                y: y0 + size,
            },
        )
        .to_polygon()
    }

    fn region(name: &str, polys: Vec<Polygon<f64>>) -> Region {
        Region {
            name: name.to_string(),
            geometry: MultiPolygon::new(polys),
        }
    }

    fn window() -> Rect<f64> {
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 })
    }

    #[test]
    fn keeps_exactly_the_intersecting_parts() {
        let inside = square(1.0, 1.0, 2.0);
        let outside = square(50.0, 50.0, 2.0);
        let regions = vec![region("A", vec![inside.clone(), outside.clone()])];

        let ov = RegionOverride::new("A", window());
        let out = apply_override(&regions, &ov).unwrap();

        assert!(out[0].geometry.iter().any(|p| p.intersects(&inside)));
        assert!(!out[0].geometry.iter().any(|p| p.intersects(&outside)));
    }

    #[test]
    fn straddling_part_is_kept() {
        // Intersecting the window edge is enough; containment is not required.
        let straddle = square(9.0, 9.0, 5.0);
        let regions = vec![region("A", vec![straddle.clone()])];

        let out = apply_override(&regions, &RegionOverride::new("A", window())).unwrap();
        assert!(out[0].geometry.iter().any(|p| p.intersects(&straddle)));
    }

    #[test]
    fn is_idempotent_on_its_own_output() {
        let regions = vec![region(
            "A",
            vec![square(1.0, 1.0, 2.0), square(50.0, 50.0, 2.0)],
        )];
        let ov = RegionOverride::new("A", window());

        let once = apply_override(&regions, &ov).unwrap();
        let twice = apply_override(&once, &ov).unwrap();
        assert_eq!(once[0].geometry, twice[0].geometry);
    }

    #[test]
    fn other_regions_pass_through_untouched() {
        let other_geom = square(100.0, 100.0, 5.0);
        let regions = vec![
            region("A", vec![square(1.0, 1.0, 2.0)]),
            region("B", vec![other_geom.clone()]),
        ];

        let out = apply_override(&regions, &RegionOverride::new("A", window())).unwrap();
        assert_eq!(out[1].geometry, MultiPolygon::new(vec![other_geom]));
    }

    #[test]
    fn missing_target_is_an_error() {
        let regions = vec![region("A", vec![square(1.0, 1.0, 2.0)])];
        assert!(apply_override(&regions, &RegionOverride::new("Nope", window())).is_err());
    }

    #[test]
    fn duplicate_target_is_an_error() {
        let regions = vec![
            region("A", vec![square(1.0, 1.0, 2.0)]),
            region("A", vec![square(2.0, 2.0, 2.0)]),
        ];
        assert!(apply_override(&regions, &RegionOverride::new("A", window())).is_err());
    }

    #[test]
    fn all_parts_outside_window_is_an_error() {
        let regions = vec![region("A", vec![square(50.0, 50.0, 2.0)])];
        assert!(apply_override(&regions, &RegionOverride::new("A", window())).is_err());
    }
}
