use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use chrono::NaiveDate;

use crate::error::{ChoromapError, ChoromapResult};

/// Compact date format used by the metric table's column labels.
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Display format used in frame titles.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// One date-labeled column of the metric table, in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateColumn {
    /// Original header label, e.g. `20200315`.
    pub label: String,
    pub date: NaiveDate,
}

impl DateColumn {
    /// Format the column's date for display: `20200315` -> `15/03/2020`.
    pub fn display(&self) -> String {
        self.date.format(DISPLAY_DATE_FORMAT).to_string()
    }
}

#[derive(Clone, Debug)]
pub struct MetricRow {
    pub name: String,
    /// One value per entry of [`MetricTable::columns`], same order.
    pub values: Vec<f64>,
}

/// The tabular metric dataset: one row per region, one numeric value per
/// date column.
///
/// The region-key column (`state` in the source data) is aligned with the
/// boundary dataset's name attribute by lookup, which is the renaming step
/// of the original pipeline. Date columns are discovered by header shape:
/// any header starting with an ASCII digit is treated as a date column and
/// must parse strictly under [`COMPACT_DATE_FORMAT`]; remaining headers are
/// prefix attributes and are ignored.
#[derive(Clone, Debug)]
pub struct MetricTable {
    columns: Vec<DateColumn>,
    rows: Vec<MetricRow>,
    by_name: HashMap<String, usize>,
}

impl MetricTable {
    /// Date columns in file order (chronological iff the file is pre-sorted;
    /// the order is never changed here).
    pub fn columns(&self) -> &[DateColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Look up a row by exact region name.
    pub fn get(&self, name: &str) -> Option<&MetricRow> {
        self.by_name.get(name).map(|&i| &self.rows[i])
    }
}

/// Read the metric table from a delimited-text file with a header row.
pub fn load_metric_table(path: &Path, key_column: &str) -> ChoromapResult<MetricTable> {
    let file =
        File::open(path).with_context(|| format!("open metric table '{}'", path.display()))?;
    read_metric_table(BufReader::new(file), key_column)
}

/// Read the metric table from any reader. See [`MetricTable`] for the
/// column rules.
pub fn read_metric_table<R: std::io::Read>(
    reader: R,
    key_column: &str,
) -> ChoromapResult<MetricTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().context("read metric table header")?.clone();

    let key_idx = headers
        .iter()
        .position(|h| h == key_column)
        .ok_or_else(|| {
            ChoromapError::data(format!("metric table has no '{key_column}' column"))
        })?;

    let mut columns = Vec::new();
    let mut value_indices = Vec::new();
    for (i, label) in headers.iter().enumerate() {
        if i == key_idx {
            continue;
        }
        if let Some(date) = parse_date_label(label)? {
            columns.push(DateColumn {
                label: label.to_string(),
                date,
            });
            value_indices.push(i);
        }
    }

    if columns.is_empty() {
        return Err(ChoromapError::data(
            "metric table has no date-labeled columns",
        ));
    }

    let mut rows = Vec::new();
    let mut by_name = HashMap::new();
    for (row_idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("read metric table row {row_idx}"))?;

        let name = record
            .get(key_idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ChoromapError::data(format!("metric table row {row_idx} has an empty key"))
            })?
            .to_string();

        let mut values = Vec::with_capacity(value_indices.len());
        for (&i, column) in value_indices.iter().zip(&columns) {
            let cell = record.get(i).unwrap_or("").trim();
            let value = cell.parse::<f64>().map_err(|_| {
                ChoromapError::data(format!(
                    "metric table row '{name}' column '{}' is not numeric: '{cell}'",
                    column.label
                ))
            })?;
            values.push(value);
        }

        if by_name.insert(name.clone(), rows.len()).is_some() {
            return Err(ChoromapError::data(format!(
                "metric table has duplicate rows for '{name}'"
            )));
        }
        rows.push(MetricRow { name, values });
    }

    if rows.is_empty() {
        return Err(ChoromapError::data("metric table contains no rows"));
    }

    Ok(MetricTable {
        columns,
        rows,
        by_name,
    })
}

/// Classify a header label.
///
/// Labels starting with a digit are date columns and must parse strictly;
/// `2020-03-15` is a hard error rather than a skipped column. Everything
/// else is a prefix attribute.
fn parse_date_label(label: &str) -> ChoromapResult<Option<NaiveDate>> {
    if !label.as_bytes().first().is_some_and(u8::is_ascii_digit) {
        return Ok(None);
    }

    let date = NaiveDate::parse_from_str(label, COMPACT_DATE_FORMAT).map_err(|e| {
        ChoromapError::data(format!(
            "column label '{label}' does not parse as a compact date: {e}"
        ))
    })?;
    Ok(Some(date))
}
