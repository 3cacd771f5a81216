use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::InputArgs;
use crate::data;

/// Load and join the inputs, then report coverage without summarizing.
/// Useful before trusting any scorecard: it shows which models were found,
/// what date range they cover, and how many rows failed to load or join.
pub fn run(args: InputArgs) -> Result<()> {
    let (records, stats) = data::load_joined(&args)?;

    let models: BTreeSet<&str> = records.iter().map(|record| record.model.as_str()).collect();
    let forecast_dates: BTreeSet<_> = records.iter().map(|record| record.forecast_date).collect();
    let target_dates: BTreeSet<_> = records
        .iter()
        .map(|record| record.target_end_date)
        .collect();

    let inverted_intervals = records
        .iter()
        .filter(|record| !(record.lower <= record.median && record.median <= record.upper))
        .count();

    info!(
        models = models.len(),
        forecast_dates = forecast_dates.len(),
        target_dates = target_dates.len(),
        "joined table coverage"
    );
    if inverted_intervals > 0 {
        warn!(
            count = inverted_intervals,
            "records whose median falls outside its own interval"
        );
    }
    if stats.join_misses > 0 {
        warn!(
            join_misses = stats.join_misses,
            "forecast rows without a matching observation"
        );
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Forecast files: {}", stats.forecast_files)?;
    writeln!(
        output,
        "Rows: read={} used={} skipped_ci_level={} errors={}",
        stats.rows_read,
        stats.rows_used,
        stats.rows_skipped_ci_level,
        stats.row_errors.len()
    )?;
    writeln!(
        output,
        "Observations: {} loaded, {} join misses, {} filtered out of range",
        stats.observations_loaded, stats.join_misses, stats.filtered_out_of_range
    )?;
    writeln!(output, "Interval violations: {inverted_intervals}")?;
    writeln!(output, "Models: {}", models.len())?;
    for model in &models {
        let periods = records
            .iter()
            .filter(|record| record.model == *model)
            .map(|record| record.forecast_date)
            .collect::<BTreeSet<_>>();
        writeln!(output, "\t{model}\tperiods={}", periods.len())?;
    }
    if let (Some(first), Some(last)) = (
        forecast_dates.iter().next(),
        forecast_dates.iter().next_back(),
    ) {
        writeln!(output, "Forecast dates: {first} .. {last}")?;
    }
    if let (Some(first), Some(last)) = (target_dates.iter().next(), target_dates.iter().next_back())
    {
        writeln!(output, "Target dates: {first} .. {last}")?;
    }
    output.flush()?;

    Ok(())
}
