use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;

use crate::core::domain::RawObservation;

/// Numeric observation columns, read as Float64 whatever type was inferred.
pub const FLOAT_COLUMNS: [&str; 7] = [
    "lat_gmtco",
    "lon_gmtco",
    "temp_bb",
    "radiant_heat_intensity",
    "radiant_heat",
    "area_bb",
    "sample_m10",
];

const UNNAMED_INDEX_COLUMNS: [&str; 2] = ["", "Unnamed: 0"];

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%dT%H:%M:%S%.f",
];

/// Parse a VNF observation CSV into a Polars DataFrame
pub fn parse_observations_csv(csv_path: &Path) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(csv_path.into()))
        .with_context(|| format!("Failed to open observation CSV: {}", csv_path.display()))?
        .finish()
        .context("Failed to parse CSV into DataFrame")?;

    let mut column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    // Samples written with a pandas index carry the id in an unnamed first column
    if !column_names.iter().any(|c| c == "id") {
        if let Some(first) = column_names.first().cloned() {
            if UNNAMED_INDEX_COLUMNS.contains(&first.as_str()) {
                df.rename(&first, "id".into())?;
                column_names[0] = "id".to_string();
            }
        }
    }

    for required in ["id", "date_mscan"].iter().chain(FLOAT_COLUMNS.iter()) {
        if !column_names.iter().any(|c| c == required) {
            bail!(
                "Observation CSV {} is missing column '{}'",
                csv_path.display(),
                required
            );
        }
    }

    let mut lazy_df = df
        .lazy()
        .with_column(col("id").cast(DataType::Int64))
        .with_column(col("date_mscan").cast(DataType::String));

    // Whole-number columns come back as i64
    for col_name in FLOAT_COLUMNS {
        lazy_df = lazy_df.with_column(col(col_name).cast(DataType::Float64));
    }

    let df = lazy_df
        .collect()
        .context("Failed to cast columns to expected types")?;

    Ok(df)
}

/// Parse an observation CSV straight into raw observation records
pub fn parse_observations_csv_to_records(csv_path: &Path) -> Result<Vec<RawObservation>> {
    let df = parse_observations_csv(csv_path)?;
    dataframe_to_observations(&df)
        .with_context(|| format!("Invalid observation data in {}", csv_path.display()))
}

/// Convert a DataFrame of VNF observations to raw observation records.
///
/// Missing values and unparseable timestamps are kept as `None` so the
/// normalizer can apply the invalid-record policy. A missing or duplicated
/// `id` is an error here, since nothing downstream could identify the row.
pub fn dataframe_to_observations(df: &DataFrame) -> Result<Vec<RawObservation>> {
    let height = df.height();

    let ids = df.column("id")?.cast(&DataType::Int64)?;
    let ids = ids.i64()?;
    let dates = df.column("date_mscan")?.cast(&DataType::String)?;
    let dates = dates.str()?;

    let floats = FLOAT_COLUMNS
        .iter()
        .map(|name| {
            df.column(name)
                .and_then(|c| c.cast(&DataType::Float64))
                .with_context(|| format!("Column '{}' is not numeric", name))
        })
        .collect::<Result<Vec<_>>>()?;
    let floats = floats
        .iter()
        .map(|c| c.f64().map_err(anyhow::Error::from))
        .collect::<Result<Vec<_>>>()?;
    let value = |column: usize, row: usize| floats[column].get(row);

    let mut seen = HashSet::with_capacity(height);
    let mut observations = Vec::with_capacity(height);

    for i in 0..height {
        let id = ids
            .get(i)
            .with_context(|| format!("Missing id at row {}", i))?;
        if !seen.insert(id) {
            bail!("Duplicate observation id {} at row {}", id, i);
        }

        let date_text = dates.get(i).filter(|text| !text.trim().is_empty());
        let date_mscan = date_text.and_then(parse_timestamp);

        observations.push(RawObservation {
            id,
            lat_gmtco: value(0, i),
            lon_gmtco: value(1, i),
            date_mscan,
            date_mscan_text: date_text
                .filter(|_| date_mscan.is_none())
                .map(str::to_string),
            temp_bb: value(2, i),
            radiant_heat_intensity: value(3, i),
            radiant_heat: value(4, i),
            area_bb: value(5, i),
            sample_m10: value(6, i),
        });
    }

    Ok(observations)
}

/// Parse a scan timestamp.
///
/// Accepts `YYYY/MM/DD HH:MM:SS[.fff]`, the same with dashes, RFC 3339 and
/// bare dates (midnight). Offsets are folded into UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            ["%Y-%m-%d", "%Y/%m/%d"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
