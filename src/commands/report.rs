use anyhow::Result;
use tracing::info;

use crate::cli::ReportArgs;
use crate::commands::output::{write_summary_json, write_summary_text};
use crate::model::{InputFileEntry, ReportManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};
use crate::{data, summary};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: ReportArgs) -> Result<()> {
    let (records, stats) = data::load_joined(&args.input)?;

    let overprediction = summary::total_overprediction(&records);
    let direction = summary::correctly_increases(&records);

    if args.json {
        write_summary_json("overprediction", &overprediction)?;
        write_summary_json("direction", &direction)?;
    } else {
        write_summary_text(
            "Overprediction rate (forecast total exceeded observed total)",
            &overprediction,
        )?;
        write_summary_text(
            "Direction accuracy (predicted an increase when cases rose)",
            &direction,
        )?;
    }

    let mut inputs = Vec::with_capacity(args.input.forecast_csvs.len() + 1);
    for path in args
        .input
        .forecast_csvs
        .iter()
        .chain(std::iter::once(&args.input.cases_csv))
    {
        inputs.push(InputFileEntry {
            path: path.display().to_string(),
            sha256: sha256_file(path)?,
        });
    }

    let manifest = ReportManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: now_utc_string(),
        command: std::env::args().collect::<Vec<_>>().join(" "),
        ci_level: args.input.ci_level,
        start_date: args.input.start_date,
        end_date: args.input.end_date,
        inputs,
        load_stats: stats,
        overprediction,
        direction,
    };

    write_json_pretty(&args.report_path, &manifest)?;
    info!(path = %args.report_path.display(), "wrote report manifest");

    Ok(())
}
