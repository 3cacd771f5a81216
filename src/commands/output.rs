use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::SummaryOutcome;

pub fn write_summary_text(title: &str, outcome: &SummaryOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    write_summary_table(&mut output, title, outcome)?;
    output.flush()?;
    Ok(())
}

pub fn write_summary_table<W: Write>(
    output: &mut W,
    title: &str,
    outcome: &SummaryOutcome,
) -> Result<()> {
    writeln!(output, "{title}")?;
    writeln!(output, "{:<20}{:>8}{:>8}", "model", "periods", "rate")?;

    for (model, rate) in &outcome.rates {
        writeln!(
            output,
            "{model:<20}{:>8}{:>8}",
            rate.groups_used,
            rate.percent()
        )?;
    }
    if outcome.rates.is_empty() {
        writeln!(output, "(no model produced a defined rate)")?;
    }

    let exclusions = &outcome.exclusions;
    if exclusions.total() > 0 {
        writeln!(
            output,
            "excluded: missing_observation={} insufficient_history={} empty_model_group={}",
            exclusions.missing_observation,
            exclusions.insufficient_history,
            exclusions.empty_model_group,
        )?;
    }

    Ok(())
}

#[derive(Serialize)]
struct SummaryResponse<'a> {
    summary: &'a str,
    #[serde(flatten)]
    outcome: &'a SummaryOutcome,
}

pub fn write_summary_json(name: &str, outcome: &SummaryOutcome) -> Result<()> {
    let response = SummaryResponse {
        summary: name,
        outcome,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize summary json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
