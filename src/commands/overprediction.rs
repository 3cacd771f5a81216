use anyhow::Result;
use tracing::info;

use crate::cli::SummaryArgs;
use crate::commands::output::{write_summary_json, write_summary_text};
use crate::{data, summary};

pub fn run(args: SummaryArgs) -> Result<()> {
    let (records, _stats) = data::load_joined(&args.input)?;
    let outcome = summary::total_overprediction(&records);

    info!(
        models = outcome.rates.len(),
        excluded_groups = outcome.exclusions.total(),
        "overprediction summary computed"
    );

    if args.json {
        write_summary_json("overprediction", &outcome)
    } else {
        write_summary_text(
            "Overprediction rate (forecast total exceeded observed total)",
            &outcome,
        )
    }
}
