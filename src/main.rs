use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use sos_leads::logging::init_logging;
use sos_leads::{run, PipelineConfig, RunDate, Stages};

/// SOS lead pipeline: unpack filing extracts, enrich, export tiered leads
#[derive(Parser, Debug)]
#[command(name = "sos-pipeline")]
#[command(about = "SOS Pipeline Runner", version)]
struct Cli {
    /// Only run the extraction and renaming step
    #[arg(long, conflicts_with = "enrich_only")]
    extract_only: bool,

    /// Only run the enrichment step (assumes extracted CSVs are present)
    #[arg(long)]
    enrich_only: bool,

    /// Project root holding raw_zips/, raw/, outputs/, ...
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Run date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<RunDate>,

    /// Config file; defaults to <root>/pipeline.toml when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the run report as JSON after the summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn stages(&self) -> Stages {
        if self.extract_only {
            Stages::ExtractOnly
        } else if self.enrich_only {
            Stages::EnrichOnly
        } else {
            Stages::All
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = PipelineConfig::load(&cli.root, cli.config.as_deref())?;
    let date = cli.date.unwrap_or_else(RunDate::today);

    let report = run(&config, date, cli.stages());

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_runs_all_stages() {
        let cli = Cli::try_parse_from(["sos-pipeline"]).unwrap();
        assert_eq!(cli.stages(), Stages::All);
        assert!(cli.date.is_none());
    }

    #[test]
    fn test_single_stage_flags() {
        let cli = Cli::try_parse_from(["sos-pipeline", "--extract-only"]).unwrap();
        assert_eq!(cli.stages(), Stages::ExtractOnly);

        let cli = Cli::try_parse_from(["sos-pipeline", "--enrich-only"]).unwrap();
        assert_eq!(cli.stages(), Stages::EnrichOnly);
    }

    #[test]
    fn test_conflicting_flags_are_a_usage_error() {
        let err = Cli::try_parse_from(["sos-pipeline", "--extract-only", "--enrich-only"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_date_flag() {
        let cli = Cli::try_parse_from(["sos-pipeline", "--date", "2024-01-01"]).unwrap();
        assert_eq!(cli.date.map(|d| d.to_string()), Some("2024-01-01".to_string()));

        assert!(Cli::try_parse_from(["sos-pipeline", "--date", "yesterday"]).is_err());
    }
}
