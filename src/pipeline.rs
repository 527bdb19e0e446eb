// 🔗 Pipeline Orchestrator
// Unpacker → Loader → Join/Enrichment → Exporter, one synchronous run at a time.
// Stages talk only through the filesystem; every failure is logged here and
// never escapes as an error.

use crate::config::{PipelineConfig, RunDate};
use crate::enrichment::EnrichmentEngine;
use crate::exporter::{export_tiers, ExportSummary};
use crate::loader::{load_dataset, Dataset};
use crate::unpacker::{extract_and_rename, ExtractReport};
use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Which stages a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stages {
    All,
    ExtractOnly,
    EnrichOnly,
}

impl Stages {
    pub fn extract(&self) -> bool {
        matches!(self, Stages::All | Stages::ExtractOnly)
    }

    pub fn enrich(&self) -> bool {
        matches!(self, Stages::All | Stages::EnrichOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    /// Soft abort: nothing written
    Skipped { reason: String },
    Exported(ExportSummary),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub run_date: RunDate,
    pub stages: Stages,
    /// None when the stage did not run or failed outright
    pub extraction: Option<ExtractReport>,
    pub enrichment: Option<EnrichmentOutcome>,
}

/// Load, join, enrich and export the datasets staged for `date`.
///
/// Missing Filings or Agents is a soft abort (`Skipped`), not an error.
/// Principals are loaded but not joined.
pub fn enrich_and_export(config: &PipelineConfig, date: RunDate) -> Result<EnrichmentOutcome> {
    let raw_dir = config.raw_path();

    let filings = load_dataset(&raw_dir, Dataset::Filings, date);
    let agents = load_dataset(&raw_dir, Dataset::Agents, date);
    let principals = load_dataset(&raw_dir, Dataset::Principals, date);

    info!(
        filings = filings.len(),
        agents = agents.len(),
        principals = principals.len(),
        "Datasets loaded"
    );

    if filings.is_empty() || agents.is_empty() {
        let reason = format!(
            "required files missing or unreadable (filings: {} rows, agents: {} rows)",
            filings.len(),
            agents.len()
        );
        warn!(%date, "Skipping enrichment: {}", reason);
        println!("⚠️ Skipping enrichment: required files missing or unreadable.");
        return Ok(EnrichmentOutcome::Skipped { reason });
    }

    let engine = EnrichmentEngine::from_config(config)?;
    let enriched = engine.enrich(&filings, agents)?;

    let summary = export_tiers(&enriched, &config.output_path(), date)?;
    info!("{}", summary.summary());
    summary.print();

    Ok(EnrichmentOutcome::Exported(summary))
}

/// Run the selected stages in order. Extraction always finishes (log
/// written) before enrichment starts.
pub fn run(config: &PipelineConfig, date: RunDate, stages: Stages) -> RunReport {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id, %date);
    let _enter = span.enter();

    info!(?stages, root = %config.root.display(), "Starting SOS pipeline");
    println!("Running SOS Pipeline for {}...", date);

    let extraction = if stages.extract() {
        match extract_and_rename(config, date) {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Extraction failed: {:#}", e);
                println!("❌ Extraction failed: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let enrichment = if stages.enrich() {
        match enrich_and_export(config, date) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Enrichment failed: {:#}", e);
                println!("❌ Enrichment failed: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    println!("🎉 Pipeline complete.");

    RunReport {
        run_id,
        run_date: date,
        stages,
        extraction,
        enrichment,
    }
}
