use geo_types::MultiPolygon;

use crate::{
    boundary::Region,
    error::{ChoromapError, ChoromapResult},
    table::{DateColumn, MetricTable},
};

/// One joined row: a region's geometry plus its metric series.
#[derive(Clone, Debug)]
pub struct JoinedRegion {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// One value per entry of [`FrameTable::columns`], same order.
    pub values: Vec<f64>,
}

/// The authoritative dataset for rendering: boundary ⨝ metric table on
/// region name, minus the excluded territories. Read-only once built.
#[derive(Clone, Debug)]
pub struct FrameTable {
    pub columns: Vec<DateColumn>,
    pub rows: Vec<JoinedRegion>,
}

/// The territory names the original pipeline filtered out after the join.
///
/// Knowingly incomplete for the US dataset (Puerto Rico and the U.S. Virgin
/// Islands are not listed); kept verbatim as the default of a
/// caller-supplied list rather than silently extended.
pub fn default_territory_exclusions() -> Vec<String> {
    [
        "American Samoa",
        "Commonwealth of the Northern Mariana Islands",
        "Guam",
    ]
    .map(String::from)
    .to_vec()
}

/// Inner-join regions with the metric table on exact name equality.
///
/// Names present in only one dataset are dropped without comment; this is
/// how non-state territories and naming mismatches disappear. `exclude`
/// entries are removed from the result by exact match. Row order follows
/// the boundary set.
pub fn join_regions(
    regions: &[Region],
    table: &MetricTable,
    exclude: &[String],
) -> ChoromapResult<FrameTable> {
    let mut rows = Vec::new();
    let mut unmatched = 0usize;

    for region in regions {
        let Some(metric) = table.get(&region.name) else {
            unmatched += 1;
            continue;
        };
        if exclude.iter().any(|name| name == &region.name) {
            continue;
        }
        rows.push(JoinedRegion {
            name: region.name.clone(),
            geometry: region.geometry.clone(),
            values: metric.values.clone(),
        });
    }

    tracing::debug!(
        joined = rows.len(),
        unmatched,
        excluded = exclude.len(),
        "joined boundary and metric datasets"
    );

    if rows.is_empty() {
        return Err(ChoromapError::validation(
            "join produced no rows (no region names shared by both datasets)",
        ));
    }

    Ok(FrameTable {
        columns: table.columns().to_vec(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use geo_types::{Coord, Rect};

    use super::*;
    use crate::table::read_metric_table;

    fn region(name: &str) -> Region {
        Region {
            name: name.to_string(),
            geometry: MultiPolygon::new(vec![
                Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }).to_polygon(),
            ]),
        }
    }

    fn table() -> MetricTable {
        let csv = "\
state,20200315,20200316
Alpha,1,2
Beta,3,4
Guam,5,6
";
        read_metric_table(csv.as_bytes(), "state").unwrap()
    }

    #[test]
    fn joins_on_shared_names_only() {
        let regions = vec![region("Alpha"), region("Beta"), region("NotInTable")];
        let joined = join_regions(&regions, &table(), &[]).unwrap();

        assert_eq!(joined.rows.len(), 2);
        assert_eq!(joined.rows[0].name, "Alpha");
        assert_eq!(joined.rows[1].name, "Beta");
    }

    #[test]
    fn exclusion_list_is_applied_exactly() {
        let regions = vec![region("Alpha"), region("Guam")];
        let exclude = vec!["Guam".to_string()];
        let joined = join_regions(&regions, &table(), &exclude).unwrap();

        assert_eq!(joined.rows.len(), 1);
        assert!(joined.rows.iter().all(|r| r.name != "Guam"));
    }

    #[test]
    fn rows_carry_full_series_and_geometry() {
        let regions = vec![region("Alpha")];
        let joined = join_regions(&regions, &table(), &[]).unwrap();

        assert_eq!(joined.columns.len(), 2);
        assert_eq!(joined.rows[0].values, vec![1.0, 2.0]);
        assert!(!joined.rows[0].geometry.0.is_empty());
    }

    #[test]
    fn empty_join_is_an_error() {
        let regions = vec![region("NotInTable")];
        assert!(join_regions(&regions, &table(), &[]).is_err());
    }

    #[test]
    fn default_exclusions_match_the_source_pipeline() {
        let ex = default_territory_exclusions();
        assert_eq!(ex.len(), 3);
        assert!(ex.iter().any(|n| n == "Guam"));
    }
}
