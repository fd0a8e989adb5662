use std::path::Path;

use anyhow::Context as _;
use geo_types::MultiPolygon;

use crate::error::{ChoromapError, ChoromapResult};

/// One administrative unit from the boundary dataset.
///
/// `name` uniquely identifies the region within its dataset and is the join
/// key against the metric table.
#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Load a polygon boundary shapefile into memory.
///
/// `name_field` is the dBase attribute holding the region name (`NAME` in
/// the Census cartographic boundary files). Sidecar `.dbf`/`.shx` files are
/// resolved by the shapefile reader from the `.shp` path.
pub fn load_regions(path: &Path, name_field: &str) -> ChoromapResult<Vec<Region>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("open boundary shapefile '{}'", path.display()))?;

    let mut regions = Vec::new();
    for (idx, row) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = row.with_context(|| format!("read boundary row {idx}"))?;

        let name = match record.get(name_field) {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) => s.trim().to_string(),
            Some(shapefile::dbase::FieldValue::Character(None)) => {
                return Err(ChoromapError::data(format!(
                    "boundary row {idx} has an empty '{name_field}' attribute"
                )));
            }
            Some(other) => {
                return Err(ChoromapError::data(format!(
                    "boundary attribute '{name_field}' is not character data (row {idx}: {other:?})"
                )));
            }
            None => {
                return Err(ChoromapError::data(format!(
                    "boundary rows have no '{name_field}' attribute"
                )));
            }
        };

        let geometry = match shape {
            shapefile::Shape::Polygon(p) => MultiPolygon::<f64>::from(p),
            other => {
                return Err(ChoromapError::data(format!(
                    "boundary row '{name}' is not a polygon (got {})",
                    other.shapetype()
                )));
            }
        };

        regions.push(Region { name, geometry });
    }

    if regions.is_empty() {
        return Err(ChoromapError::data(format!(
            "boundary shapefile '{}' contains no rows",
            path.display()
        )));
    }

    Ok(regions)
}
