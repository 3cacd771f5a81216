use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::cli::InputArgs;
use crate::model::{ForecastRecord, LoadStats, RowError};

const FORECAST_COLUMNS: &[&str] = &[
    "model",
    "date",
    "ci_level",
    "forecast_date",
    "mean",
    "lower",
    "upper",
];
const CASE_COLUMNS: &[&str] = &["date", "cases"];

/// Load every forecast CSV, pivot to one record per
/// (model, forecast_date, target_end_date) at the requested ci_level, join
/// observed cases by target date, and filter to the requested date range.
///
/// Missing observations are kept as `true_value = None` so the summaries can
/// account for them explicitly instead of dropping rows here.
pub fn load_joined(args: &InputArgs) -> Result<(Vec<ForecastRecord>, LoadStats)> {
    let mut stats = LoadStats::default();

    let observations = load_observations(&args.cases_csv, &mut stats)?;
    if observations.is_empty() {
        bail!(
            "no observations loaded from {}",
            args.cases_csv.display()
        );
    }

    let mut records = Vec::new();
    let mut seen_keys: HashSet<(String, NaiveDate, NaiveDate)> = HashSet::new();

    for path in &args.forecast_csvs {
        stats.forecast_files += 1;
        let file = File::open(path)
            .with_context(|| format!("failed to open forecast csv: {}", path.display()))?;
        read_forecast_rows(
            file,
            &path.display().to_string(),
            args.ci_level,
            &mut seen_keys,
            &mut records,
            &mut stats,
        )?;
    }

    if records.is_empty() {
        bail!("no forecast rows matched ci_level {}", args.ci_level);
    }

    join_and_filter(
        &mut records,
        &observations,
        args.start_date,
        args.end_date,
        &mut stats,
    );

    info!(
        files = stats.forecast_files,
        rows_read = stats.rows_read,
        rows_used = stats.rows_used,
        join_misses = stats.join_misses,
        row_errors = stats.row_errors.len(),
        "loaded forecast table"
    );
    for error in &stats.row_errors {
        warn!(file = %error.file, line = error.line, message = %error.message, "skipped row");
    }

    Ok((records, stats))
}

/// Drop records outside the target-date range, then attach the observed
/// value for each remaining target date. The range filter runs first so
/// `join_misses` only counts rows the summaries will actually see.
fn join_and_filter(
    records: &mut Vec<ForecastRecord>,
    observations: &BTreeMap<NaiveDate, f64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    stats: &mut LoadStats,
) {
    records.retain(|record| {
        let in_range = start_date.is_none_or(|start| record.target_end_date >= start)
            && end_date.is_none_or(|end| record.target_end_date <= end);
        if !in_range {
            stats.filtered_out_of_range += 1;
        }
        in_range
    });

    for record in records.iter_mut() {
        record.true_value = observations.get(&record.target_end_date).copied();
        if record.true_value.is_none() {
            stats.join_misses += 1;
        }
    }

    stats.rows_used = records.len();
}

pub fn load_observations(
    path: &Path,
    stats: &mut LoadStats,
) -> Result<BTreeMap<NaiveDate, f64>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open cases csv: {}", path.display()))?;
    let observations = read_observation_rows(file, &path.display().to_string(), stats)?;
    stats.observations_loaded = observations.len();
    Ok(observations)
}

fn read_forecast_rows<R: io::Read>(
    input: R,
    file_label: &str,
    ci_level: f64,
    seen_keys: &mut HashSet<(String, NaiveDate, NaiveDate)>,
    records: &mut Vec<ForecastRecord>,
    stats: &mut LoadStats,
) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv headers: {file_label}"))?
        .clone();
    let columns = build_header_map(&headers);
    ensure_columns(&columns, FORECAST_COLUMNS, file_label)?;

    for (idx, result) in reader.records().enumerate() {
        // headers occupy line 1, so records start at line 2
        let line = idx + 2;
        stats.rows_read += 1;

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                push_row_error(stats, file_label, line, format!("csv parse error: {err}"));
                continue;
            }
        };

        match parse_forecast_row(&record, &columns) {
            Ok(row) => {
                if (row.ci_level - ci_level).abs() > f64::EPSILON {
                    stats.rows_skipped_ci_level += 1;
                    continue;
                }
                let key = (row.model.clone(), row.forecast_date, row.target_end_date);
                if !seen_keys.insert(key) {
                    push_row_error(
                        stats,
                        file_label,
                        line,
                        format!(
                            "duplicate forecast for model {} issued {} targeting {}",
                            row.model, row.forecast_date, row.target_end_date
                        ),
                    );
                    continue;
                }
                records.push(ForecastRecord {
                    model: row.model,
                    forecast_date: row.forecast_date,
                    target_end_date: row.target_end_date,
                    median: row.mean,
                    lower: row.lower,
                    upper: row.upper,
                    true_value: None,
                });
            }
            Err(message) => push_row_error(stats, file_label, line, message),
        }
    }

    Ok(())
}

fn read_observation_rows<R: io::Read>(
    input: R,
    file_label: &str,
    stats: &mut LoadStats,
) -> Result<BTreeMap<NaiveDate, f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv headers: {file_label}"))?
        .clone();
    let columns = build_header_map(&headers);
    ensure_columns(&columns, CASE_COLUMNS, file_label)?;

    let mut observations = BTreeMap::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                push_row_error(stats, file_label, line, format!("csv parse error: {err}"));
                continue;
            }
        };

        let date = match parse_date(&record, &columns, "date") {
            Ok(date) => date,
            Err(message) => {
                push_row_error(stats, file_label, line, message);
                continue;
            }
        };
        let cases = match parse_number(&record, &columns, "cases") {
            Ok(cases) => cases,
            Err(message) => {
                push_row_error(stats, file_label, line, message);
                continue;
            }
        };

        // first row wins, matching the forecast-side duplicate policy
        match observations.entry(date) {
            Entry::Vacant(slot) => {
                slot.insert(cases);
            }
            Entry::Occupied(_) => push_row_error(
                stats,
                file_label,
                line,
                format!("duplicate observation for {date}"),
            ),
        }
    }

    Ok(observations)
}

struct RawForecastRow {
    model: String,
    forecast_date: NaiveDate,
    target_end_date: NaiveDate,
    ci_level: f64,
    mean: f64,
    lower: f64,
    upper: f64,
}

fn parse_forecast_row(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
) -> Result<RawForecastRow, String> {
    let model = field(record, columns, "model")?.to_owned();
    if model.is_empty() {
        return Err("empty model identifier".to_owned());
    }

    Ok(RawForecastRow {
        model,
        forecast_date: parse_date(record, columns, "forecast_date")?,
        target_end_date: parse_date(record, columns, "date")?,
        ci_level: parse_number(record, columns, "ci_level")?,
        mean: parse_number(record, columns, "mean")?,
        lower: parse_number(record, columns, "lower")?,
        upper: parse_number(record, columns, "upper")?,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect()
}

fn ensure_columns(
    columns: &HashMap<String, usize>,
    required: &[&str],
    file_label: &str,
) -> Result<()> {
    for name in required {
        if !columns.contains_key(*name) {
            bail!("missing required column '{name}' in {file_label}");
        }
    }
    Ok(())
}

fn field<'a>(
    record: &'a StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    columns
        .get(name)
        .and_then(|&idx| record.get(idx))
        .ok_or_else(|| format!("missing value for column '{name}'"))
}

fn parse_date(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> Result<NaiveDate, String> {
    let raw = field(record, columns, name)?;
    raw.parse::<NaiveDate>()
        .map_err(|_| format!("invalid date in column '{name}': {raw}"))
}

fn parse_number(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> Result<f64, String> {
    let raw = field(record, columns, name)?;
    raw.parse::<f64>()
        .map_err(|_| format!("invalid number in column '{name}': {raw}"))
}

fn push_row_error(stats: &mut LoadStats, file: &str, line: usize, message: String) {
    stats.row_errors.push(RowError {
        file: file.to_owned(),
        line,
        message,
    });
}
