use anyhow::Result;
use tracing::info;

use crate::cli::SummaryArgs;
use crate::commands::output::{write_summary_json, write_summary_text};
use crate::{data, summary};

pub fn run(args: SummaryArgs) -> Result<()> {
    let (records, _stats) = data::load_joined(&args.input)?;
    let outcome = summary::correctly_increases(&records);

    info!(
        models = outcome.rates.len(),
        excluded_groups = outcome.exclusions.total(),
        "direction summary computed"
    );

    if args.json {
        write_summary_json("direction", &outcome)
    } else {
        write_summary_text(
            "Direction accuracy (predicted an increase when cases rose)",
            &outcome,
        )
    }
}
