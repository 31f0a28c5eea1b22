//! Per-dataset reshaping of raw EIA frames into canonical tables.
//!
//! Every transform is a pure `DataFrame -> DataFrame` function. The output
//! always leads with `Interval Start` / `Interval End` (UTC, end-labelled
//! periods shifted back by the dataset frequency).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use gridfeed_core::{FeedError, FeedResult};
use gridfeed_ts::{datetime_series, interval_columns, INTERVAL_END, INTERVAL_START};
use polars::datatypes::IdxSize;
use polars::prelude::*;
use tracing::warn;

pub const PERIOD: &str = "period";

pub const INTERCHANGE_COLUMNS: [&str; 7] = [
    INTERVAL_START,
    INTERVAL_END,
    "From BA",
    "From BA Name",
    "To BA",
    "To BA Name",
    "MW",
];

/// Region-data value columns, in output order.
pub const REGION_VALUE_COLUMNS: [&str; 4] =
    ["Load", "Load Forecast", "Net Generation", "Total Interchange"];

const RESPONDENT: &str = "Respondent";
const RESPONDENT_NAME: &str = "Respondent Name";

/// Human label for a region-data type code.
///
/// Unknown codes have no label; callers decide what to do with them.
pub fn region_type_label(code: &str) -> Option<&'static str> {
    match code {
        "D" => Some("Load"),
        "TI" => Some("Total Interchange"),
        "NG" => Some("Net Generation"),
        "DF" => Some("Load Forecast"),
        _ => None,
    }
}

/// `electricity/rto/interchange-data`: one row per BA-to-BA flow.
pub fn rto_interchange(raw: DataFrame, duration: Duration) -> FeedResult<DataFrame> {
    if raw.width() == 0 {
        return empty_frame(&[
            ("From BA", DataType::Utf8),
            ("From BA Name", DataType::Utf8),
            ("To BA", DataType::Utf8),
            ("To BA Name", DataType::Utf8),
            ("MW", DataType::Int64),
        ]);
    }

    let mut df = with_intervals(raw, duration)?;
    rename_columns(
        &mut df,
        &[
            ("value", "MW"),
            ("fromba", "From BA"),
            ("toba", "To BA"),
            ("fromba-name", "From BA Name"),
            ("toba-name", "To BA Name"),
        ],
    )?;
    let df = df.select(INTERCHANGE_COLUMNS)?;
    sort_by_interval_then(&df, "From BA")
}

/// `electricity/rto/region-data`: long rows of (respondent, type, value)
/// pivoted to one row per respondent-interval with a column per type.
pub fn rto_region_data(raw: DataFrame, duration: Duration) -> FeedResult<DataFrame> {
    let columns: Vec<String> = REGION_VALUE_COLUMNS.iter().map(|c| c.to_string()).collect();
    if raw.width() == 0 {
        return pivot_by_respondent(&PivotInput::default(), &columns);
    }

    let mut df = with_intervals(raw, duration)?;
    rename_columns(
        &mut df,
        &[
            ("value", "MW"),
            ("respondent", RESPONDENT),
            ("respondent-name", RESPONDENT_NAME),
            ("type", "Type"),
        ],
    )?;

    let mut unmapped = BTreeSet::new();
    let labels = text_values(&df, "Type")?
        .into_iter()
        .map(|code| {
            code.and_then(|code| match region_type_label(&code) {
                Some(label) => Some(label.to_string()),
                None => {
                    unmapped.insert(code);
                    None
                }
            })
        })
        .collect();
    if !unmapped.is_empty() {
        warn!(codes = ?unmapped, "dropping region-data rows with unmapped type codes");
    }

    let input = PivotInput::from_frame(&df, labels)?;
    pivot_by_respondent(&input, &columns)
}

/// `electricity/rto/fuel-type-data`: generation by fuel, pivoted to one
/// column per fuel type present in the data.
pub fn rto_fuel_type_data(raw: DataFrame, duration: Duration) -> FeedResult<DataFrame> {
    if raw.width() == 0 {
        return pivot_by_respondent(&PivotInput::default(), &[]);
    }

    let mut df = with_intervals(raw, duration)?;
    rename_columns(
        &mut df,
        &[
            ("value", "MW"),
            ("respondent", RESPONDENT),
            ("respondent-name", RESPONDENT_NAME),
            ("type-name", "Fuel Type"),
        ],
    )?;

    let labels = text_values(&df, "Fuel Type")?;
    let columns: Vec<String> = labels
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let input = PivotInput::from_frame(&df, labels)?;
    pivot_by_respondent(&input, &columns)
}

/// Replace the `period` column with leading interval bounds.
pub fn with_intervals(df: DataFrame, duration: Duration) -> FeedResult<DataFrame> {
    let period = df
        .column(PERIOD)
        .map_err(|_| FeedError::Schema(format!("missing column '{PERIOD}'")))?;
    let labels = period
        .utf8()
        .map_err(|_| FeedError::Schema(format!("'{PERIOD}' column must be text")))?;
    let (start, end) = interval_columns(labels, duration)?;

    let rest = df.drop(PERIOD)?;
    let mut columns = vec![start, end];
    columns.extend(rest.get_columns().iter().cloned());
    Ok(DataFrame::new(columns)?)
}

/// Rename columns, failing if any source column is absent.
pub fn rename_columns(df: &mut DataFrame, renames: &[(&str, &str)]) -> FeedResult<()> {
    for &(from, to) in renames {
        if !df.get_column_names().iter().any(|name| *name == from) {
            return Err(FeedError::Schema(format!(
                "missing column '{from}' (to be renamed '{to}')"
            )));
        }
        df.rename(from, to)?;
    }
    Ok(())
}

/// Coerce a value column to nullable integers.
///
/// Integer columns pass through, whole floats convert, and text is parsed;
/// fractional or non-numeric values are parse errors.
pub fn nullable_ints(series: &Series) -> FeedResult<Vec<Option<i64>>> {
    let name = series.name();
    match series.dtype() {
        DataType::Float32 | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast.f64()?;
            values
                .into_iter()
                .map(|value| match value {
                    Some(v) if v.is_nan() => Ok(None),
                    Some(v) => whole_number(v, name).map(Some),
                    None => Ok(None),
                })
                .collect()
        }
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| match value.map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => parse_int(text, name).map(Some),
            })
            .collect(),
        dtype if dtype.is_numeric() => {
            let cast = series.cast(&DataType::Int64)?;
            let values = cast.i64()?.into_iter().collect();
            Ok(values)
        }
        other => Err(FeedError::Parse(format!(
            "column '{name}' of type {other} cannot be read as integers"
        ))),
    }
}

fn whole_number(value: f64, column: &str) -> FeedResult<i64> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(FeedError::Parse(format!(
            "column '{column}': {value} is not a whole number"
        )));
    }
    Ok(value as i64)
}

fn parse_int(text: &str, column: &str) -> FeedResult<i64> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(value);
    }
    let value = text.parse::<f64>().map_err(|_| {
        FeedError::Parse(format!("column '{column}': '{text}' is not a number"))
    })?;
    whole_number(value, column)
}

fn text_values(df: &DataFrame, column: &str) -> FeedResult<Vec<Option<String>>> {
    let series = df
        .column(column)
        .map_err(|_| FeedError::Schema(format!("missing column '{column}'")))?
        .cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

fn interval_millis(df: &DataFrame, column: &str) -> FeedResult<Vec<i64>> {
    let series = df.column(column)?.cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| FeedError::Schema(format!("row {row}: null '{column}'")))
        })
        .collect()
}

fn cmp_nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by interval start, then by `key` (nulls last).
fn sort_by_interval_then(df: &DataFrame, key: &str) -> FeedResult<DataFrame> {
    let starts = interval_millis(df, INTERVAL_START)?;
    let keys = text_values(df, key)?;

    let mut order: Vec<IdxSize> = (0..df.height() as IdxSize).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (a as usize, b as usize);
        starts[a]
            .cmp(&starts[b])
            .then_with(|| cmp_nulls_last(keys[a].as_deref(), keys[b].as_deref()))
    });

    let idx = IdxCa::new("order", order.as_slice());
    Ok(df.take(&idx)?)
}

/// Columns shared by the respondent-keyed pivots, one entry per raw row.
#[derive(Debug, Default)]
struct PivotInput {
    starts: Vec<i64>,
    ends: Vec<i64>,
    respondents: Vec<Option<String>>,
    names: Vec<Option<String>>,
    labels: Vec<Option<String>>,
    values: Vec<Option<i64>>,
}

impl PivotInput {
    fn from_frame(df: &DataFrame, labels: Vec<Option<String>>) -> FeedResult<Self> {
        Ok(Self {
            starts: interval_millis(df, INTERVAL_START)?,
            ends: interval_millis(df, INTERVAL_END)?,
            respondents: text_values(df, RESPONDENT)?,
            names: text_values(df, RESPONDENT_NAME)?,
            labels,
            values: nullable_ints(df.column("MW")?)?,
        })
    }
}

type PivotKey = (i64, i64, String, String);

// i128 sums cannot overflow on i64 inputs.
#[derive(Debug, Default, Clone, Copy)]
struct Cell {
    sum: i128,
    count: i128,
}

impl Cell {
    fn push(&mut self, value: Option<i64>) {
        if let Some(value) = value {
            self.sum += i128::from(value);
            self.count += 1;
        }
    }

    // Duplicate (key, label) rows collapse to their rounded mean.
    fn value(&self) -> Option<i64> {
        if self.count == 0 {
            return None;
        }
        // Round half away from zero; the mean of i64 values fits in i64.
        let twice = 2 * self.sum;
        let rounded = if twice >= 0 {
            (twice + self.count) / (2 * self.count)
        } else {
            (twice - self.count) / (2 * self.count)
        };
        i64::try_from(rounded).ok()
    }
}

/// Pivot long rows into one row per (interval, respondent, name).
///
/// Rows with no label, respondent or respondent name are dropped, as are
/// groups with no value in any output column. Every name in `columns`
/// becomes an Int64 column whether or not any row carried it.
fn pivot_by_respondent(input: &PivotInput, columns: &[String]) -> FeedResult<DataFrame> {
    let mut rows: BTreeMap<PivotKey, BTreeMap<&str, Cell>> = BTreeMap::new();
    for (row, label) in input.labels.iter().enumerate() {
        let Some(label) = label else { continue };
        let (Some(respondent), Some(name)) = (&input.respondents[row], &input.names[row]) else {
            continue;
        };
        let key = (
            input.starts[row],
            input.ends[row],
            respondent.clone(),
            name.clone(),
        );
        rows.entry(key)
            .or_default()
            .entry(label.as_str())
            .or_default()
            .push(input.values[row]);
    }

    let mut starts = Vec::with_capacity(rows.len());
    let mut ends = Vec::with_capacity(rows.len());
    let mut respondents = Vec::with_capacity(rows.len());
    let mut names = Vec::with_capacity(rows.len());
    let mut values: Vec<Vec<Option<i64>>> = vec![Vec::with_capacity(rows.len()); columns.len()];

    for ((start, end, respondent, name), cells) in &rows {
        let row: Vec<Option<i64>> = columns
            .iter()
            .map(|column| cells.get(column.as_str()).and_then(Cell::value))
            .collect();
        if row.iter().all(Option::is_none) {
            continue;
        }
        starts.push(*start);
        ends.push(*end);
        respondents.push(respondent.as_str());
        names.push(name.as_str());
        for (value, out) in row.into_iter().zip(values.iter_mut()) {
            out.push(value);
        }
    }

    let mut series = vec![
        datetime_series(INTERVAL_START, starts),
        datetime_series(INTERVAL_END, ends),
        Series::new(RESPONDENT, respondents),
        Series::new(RESPONDENT_NAME, names),
    ];
    for (column, column_values) in columns.iter().zip(values) {
        series.push(Series::new(column.as_str(), column_values));
    }
    Ok(DataFrame::new(series)?)
}

/// Zero-row canonical frame: interval columns followed by `columns`.
fn empty_frame(columns: &[(&str, DataType)]) -> FeedResult<DataFrame> {
    let mut series = vec![
        datetime_series(INTERVAL_START, Vec::new()),
        datetime_series(INTERVAL_END, Vec::new()),
    ];
    series.extend(
        columns
            .iter()
            .map(|(name, dtype)| Series::new_empty(name, dtype)),
    );
    Ok(DataFrame::new(series)?)
}
